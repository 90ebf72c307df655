//! Canonical parameter vocabulary and per-provider normalization tables.
//!
//! Every upstream provider names measurements differently: USGS uses numeric
//! parameter codes, the Water Quality Portal uses long characteristic names,
//! CEDEN uses its own analyte labels. The functions here map each provider
//! vocabulary onto one closed set of canonical keys. Unknown provider fields
//! map to `None` and are silently dropped by callers.

/// Canonical water-quality parameter keys. Closed set; adapters must not
/// invent new ones.
pub mod keys {
    pub const DO: &str = "DO";
    pub const TEMPERATURE: &str = "temperature";
    pub const PH: &str = "pH";
    pub const TURBIDITY: &str = "turbidity";
    pub const TSS: &str = "TSS";
    pub const TN: &str = "TN";
    pub const TP: &str = "TP";
    pub const BACTERIA: &str = "bacteria";
    pub const CHLOROPHYLL: &str = "chlorophyll";
    pub const CONDUCTIVITY: &str = "conductivity";
    pub const SALINITY: &str = "salinity";
    pub const SECCHI: &str = "secchi";
    pub const COLIFORM_TOTAL: &str = "coliform_total";
    pub const DISCHARGE: &str = "discharge";
    pub const GAGE_HEIGHT: &str = "gage_height";
}

/// Auxiliary enrichment keys. Namespaced with a leading underscore so UI
/// layers can tell them apart from canonical water-quality parameters.
pub mod aux_keys {
    pub const VIOLATIONS: &str = "_violations";
    pub const TOXICITY_SAMPLES: &str = "_toxicity_samples";
}

/// All canonical keys, in the order the cascade considers them complete.
pub const ALL_CANONICAL: &[&str] = &[
    keys::DO,
    keys::TEMPERATURE,
    keys::PH,
    keys::TURBIDITY,
    keys::TSS,
    keys::TN,
    keys::TP,
    keys::BACTERIA,
    keys::CHLOROPHYLL,
    keys::CONDUCTIVITY,
    keys::SALINITY,
    keys::SECCHI,
    keys::COLIFORM_TOTAL,
    keys::DISCHARGE,
    keys::GAGE_HEIGHT,
];

/// True for namespaced enrichment keys (leading underscore marker).
pub fn is_aux_key(key: &str) -> bool {
    key.starts_with('_')
}

/// USGS NWIS parameter code -> canonical key.
pub fn from_usgs_code(code: &str) -> Option<&'static str> {
    match code {
        "00300" => Some(keys::DO),
        "00010" => Some(keys::TEMPERATURE),
        "00400" => Some(keys::PH),
        "63680" => Some(keys::TURBIDITY),
        "00095" => Some(keys::CONDUCTIVITY),
        "00060" => Some(keys::DISCHARGE),
        "00065" => Some(keys::GAGE_HEIGHT),
        "00480" => Some(keys::SALINITY),
        _ => None,
    }
}

/// Water Quality Portal characteristic name -> canonical key.
pub fn from_wqp_characteristic(name: &str) -> Option<&'static str> {
    match name {
        "Dissolved oxygen (DO)" => Some(keys::DO),
        "Temperature, water" => Some(keys::TEMPERATURE),
        "pH" => Some(keys::PH),
        "Turbidity" => Some(keys::TURBIDITY),
        "Total suspended solids" => Some(keys::TSS),
        "Nitrogen, mixed forms (NH3), (NH4), organic, (NO2) and (NO3)" => Some(keys::TN),
        "Total Nitrogen, mixed forms" => Some(keys::TN),
        "Nitrogen" => Some(keys::TN),
        "Phosphorus" => Some(keys::TP),
        "Total Phosphorus, mixed forms" => Some(keys::TP),
        "Escherichia coli" => Some(keys::BACTERIA),
        "Enterococcus" => Some(keys::BACTERIA),
        "Fecal Coliform" => Some(keys::BACTERIA),
        "Chlorophyll a" => Some(keys::CHLOROPHYLL),
        "Specific conductance" => Some(keys::CONDUCTIVITY),
        "Salinity" => Some(keys::SALINITY),
        "Secchi depth" => Some(keys::SECCHI),
        _ => None,
    }
}

/// CEDEN analyte label -> canonical key.
pub fn from_ceden_analyte(analyte: &str) -> Option<&'static str> {
    match analyte {
        "Oxygen, Dissolved, Total" | "Oxygen, Dissolved" => Some(keys::DO),
        "Temperature" => Some(keys::TEMPERATURE),
        "pH" => Some(keys::PH),
        "Turbidity, Total" | "Turbidity" => Some(keys::TURBIDITY),
        "E. coli" | "Enterococcus" | "Enterococcus, Total" | "Coliform, Fecal" => {
            Some(keys::BACTERIA)
        }
        "Coliform, Total" => Some(keys::COLIFORM_TOTAL),
        "Nitrogen, Total" | "Nitrogen, Total Kjeldahl" => Some(keys::TN),
        "Phosphorus as P" | "Phosphorus, Total" => Some(keys::TP),
        "Chlorophyll a" => Some(keys::CHLOROPHYLL),
        "SpecificConductivity" | "Specific Conductance" => Some(keys::CONDUCTIVITY),
        "Salinity" => Some(keys::SALINITY),
        "Total Suspended Solids" | "Suspended Sediment Concentration" => Some(keys::TSS),
        _ => None,
    }
}

/// All WQP characteristic names the engine queries for, used to build the
/// characteristicName filter in WQP requests.
pub const WQP_CHARACTERISTICS: &[&str] = &[
    "Dissolved oxygen (DO)",
    "Temperature, water",
    "pH",
    "Turbidity",
    "Total suspended solids",
    "Nitrogen, mixed forms (NH3), (NH4), organic, (NO2) and (NO3)",
    "Total Nitrogen, mixed forms",
    "Nitrogen",
    "Phosphorus",
    "Escherichia coli",
    "Enterococcus",
    "Fecal Coliform",
    "Chlorophyll a",
    "Specific conductance",
    "Salinity",
    "Secchi depth",
];

/// All USGS parameter codes the engine queries for.
pub const USGS_CODES: &[&str] = &[
    "00300", "00010", "00400", "63680", "00095", "00060", "00065", "00480",
];
