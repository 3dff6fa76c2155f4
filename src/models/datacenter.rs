//! Datacenter record structure.

use serde::{Deserialize, Serialize};

/// A single data-center facility scraped from a market page.
///
/// Field order matches the CSV column order of the per-state output files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Datacenter {
    /// State slug (kebab-case, e.g. "new-york")
    pub state: String,

    /// Market slug within the state (e.g. "dallas")
    pub market: String,

    /// Facility display name
    pub facility: String,

    /// Operating company
    pub company: String,

    /// Street address line
    pub street: String,

    /// 5-digit ZIP code, if found
    pub zip: Option<String>,

    /// City, if found
    pub city: Option<String>,

    /// Market page the record was scraped from
    pub source_url: String,
}

/// A state entry on the USA listing page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateLink {
    /// State slug
    pub slug: String,

    /// Full URL of the state page
    pub url: String,
}

/// A market entry on a state page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MarketLink {
    /// Market slug
    pub slug: String,

    /// Full URL of the market page
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_order() {
        let dc = Datacenter {
            state: "texas".into(),
            market: "dallas".into(),
            facility: "DFW1".into(),
            company: "Example Co".into(),
            street: "100 Main St, Suite 200".into(),
            zip: Some("75201".into()),
            city: Some("Dallas".into()),
            source_url: "https://www.datacentermap.com/usa/texas/dallas/".into(),
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&dc).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let header = out.lines().next().unwrap();
        assert_eq!(
            header,
            "state,market,facility,company,street,zip,city,source_url"
        );
        // The street contains a comma, so the writer must quote it.
        assert!(out.contains("\"100 Main St, Suite 200\""));
    }
}
