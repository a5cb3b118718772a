// FME event tables
use fmeperf_raw::fme::cache::{channel, events as cache};
use fmeperf_raw::fme::clock::events as clock;
use fmeperf_raw::fme::fabric::events as fabric;
use fmeperf_raw::fme::iommu::{events as iommu, sip_events as iommu_sip};

enum_with_data! {
    pub enum ClockEvent: u8 {
        Clock => ("clock", clock::CLOCK),
    }
    impl code -> u8
}

// Cache events: (event code, channel selector)
enum_with_data! {
    pub enum CacheEvent: (u8, u8) {
        ReadHit => ("read_hit", (cache::READ_HIT, channel::READ)),
        WriteHit => ("write_hit", (cache::WRITE_HIT, channel::WRITE)),
        ReadMiss => ("read_miss", (cache::READ_MISS, channel::READ)),
        WriteMiss => ("write_miss", (cache::WRITE_MISS, channel::WRITE)),
        HoldRequest => ("hold_request", (cache::HOLD_REQUEST, channel::READ)),
        DataWritePortContention => ("data_write_port_contention", (cache::DATA_WRITE_PORT_CONTENTION, channel::WRITE)),
        TagWritePortContention => ("tag_write_port_contention", (cache::TAG_WRITE_PORT_CONTENTION, channel::WRITE)),
        TxReqStall => ("tx_req_stall", (cache::TX_REQ_STALL, channel::READ)),
        RxReqStall => ("rx_req_stall", (cache::RX_REQ_STALL, channel::READ)),
        Eviction => ("eviction", (cache::EVICTION, channel::READ)),
    }
    impl code_and_channel -> (u8, u8)
}

// Fabric events, exposed both as aggregate and per-port events
enum_with_data! {
    pub enum FabricEvent: u8 {
        Pcie0Read => ("pcie0_read", fabric::PCIE0_READ),
        Pcie0Write => ("pcie0_write", fabric::PCIE0_WRITE),
        Pcie1Read => ("pcie1_read", fabric::PCIE1_READ),
        Pcie1Write => ("pcie1_write", fabric::PCIE1_WRITE),
        UpiRead => ("upi_read", fabric::UPI_READ),
        UpiWrite => ("upi_write", fabric::UPI_WRITE),
        MmioRead => ("mmio_read", fabric::MMIO_READ),
        MmioWrite => ("mmio_write", fabric::MMIO_WRITE),
    }
    impl code -> u8
}

// First-level IOMMU events (per-port only)
enum_with_data! {
    pub enum IommuEvent: u8 {
        ReadTransaction => ("read_transaction", iommu::READ_TRANSACTION),
        WriteTransaction => ("write_transaction", iommu::WRITE_TRANSACTION),
        DevtlbReadHit => ("devtlb_read_hit", iommu::DEVTLB_READ_HIT),
        DevtlbWriteHit => ("devtlb_write_hit", iommu::DEVTLB_WRITE_HIT),
        Devtlb4kFill => ("devtlb_4k_fill", iommu::DEVTLB_4K_FILL),
        Devtlb2mFill => ("devtlb_2m_fill", iommu::DEVTLB_2M_FILL),
        Devtlb1gFill => ("devtlb_1g_fill", iommu::DEVTLB_1G_FILL),
    }
    impl code -> u8
}

// Second-level IOMMU events
enum_with_data! {
    pub enum IommuSipEvent: u8 {
        Iotlb4kHit => ("iotlb_4k_hit", iommu_sip::IOTLB_4K_HIT),
        Iotlb2mHit => ("iotlb_2m_hit", iommu_sip::IOTLB_2M_HIT),
        Iotlb1gHit => ("iotlb_1g_hit", iommu_sip::IOTLB_1G_HIT),
        SlpwcL3Hit => ("slpwc_l3_hit", iommu_sip::SLPWC_L3_HIT),
        SlpwcL4Hit => ("slpwc_l4_hit", iommu_sip::SLPWC_L4_HIT),
        RccHit => ("rcc_hit", iommu_sip::RCC_HIT),
        Iotlb4kMiss => ("iotlb_4k_miss", iommu_sip::IOTLB_4K_MISS),
        Iotlb2mMiss => ("iotlb_2m_miss", iommu_sip::IOTLB_2M_MISS),
        Iotlb1gMiss => ("iotlb_1g_miss", iommu_sip::IOTLB_1G_MISS),
        SlpwcL3Miss => ("slpwc_l3_miss", iommu_sip::SLPWC_L3_MISS),
        SlpwcL4Miss => ("slpwc_l4_miss", iommu_sip::SLPWC_L4_MISS),
        RccMiss => ("rcc_miss", iommu_sip::RCC_MISS),
    }
    impl code -> u8
}
