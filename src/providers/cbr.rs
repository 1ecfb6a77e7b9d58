//! Central bank of Russia exchange-rate provider.
//!
//! Resolution is a two step protocol: the currency catalog maps an ISO code
//! to the bank's internal identifier, which is then used to request the
//! daily rate series.

use crate::core::error::{PriceError, Result};
use crate::core::{DateRange, PriceRecord, PriceSource};
use crate::providers::util::{fetch_document, http_client, parse_xml};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

const CATALOG_PATH: &str = "/scripts/XML_valFull.asp";
const SERIES_PATH: &str = "/scripts/XML_dynamic.asp";
const QUERY_DATE_FORMAT: &str = "%d/%m/%Y";
const RECORD_DATE_FORMAT: &str = "%d.%m.%Y";

pub struct CbrClient {
    base_url: String,
    client: reqwest::Client,
}

impl CbrClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(CbrClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Looks up the bank's internal identifier for an ISO currency code.
    async fn resolve_id(&self, commodity: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, CATALOG_PATH);
        let text = fetch_document(&self.client, "currency catalog", &url, &[]).await?;
        let catalog: Catalog = parse_xml("currency catalog", &text)?;

        catalog
            .items
            .into_iter()
            .find(|item| item.iso_char_code.as_deref().map(str::trim) == Some(commodity))
            .map(|item| item.parent_code.trim().to_string())
            .ok_or_else(|| PriceError::UnknownCommodity(commodity.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(rename = "Item", default)]
    items: Vec<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    #[serde(rename = "ISO_Char_Code", default)]
    iso_char_code: Option<String>,
    #[serde(rename = "ParentCode")]
    parent_code: String,
}

#[derive(Debug, Deserialize)]
struct RateSeries {
    #[serde(rename = "Record", default)]
    records: Vec<RateRecord>,
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    #[serde(rename = "@Date")]
    date: String,
    #[serde(rename = "Nominal")]
    nominal: String,
    #[serde(rename = "Value")]
    value: String,
}

impl RateRecord {
    /// Converts the quoted lot rate into a per-unit price for `commodity`.
    fn to_price(&self, commodity: &str) -> Result<PriceRecord> {
        let date = NaiveDate::parse_from_str(self.date.trim(), RECORD_DATE_FORMAT)
            .map_err(|e| PriceError::field("Date", &self.date, e))?;

        let nominal: i64 = self
            .nominal
            .trim()
            .parse()
            .map_err(|e| PriceError::field("Nominal", &self.nominal, e))?;
        if nominal <= 0 {
            return Err(PriceError::field(
                "Nominal",
                &self.nominal,
                "must be a positive integer",
            ));
        }

        let value = Decimal::from_str(&self.value.trim().replace(',', "."))
            .map_err(|e| PriceError::field("Value", &self.value, e))?;
        let price = value
            .checked_div(Decimal::from(nominal))
            .ok_or_else(|| PriceError::field("Value", &self.value, "division overflow"))?;

        Ok(PriceRecord::new(commodity, date, price.normalize()))
    }
}

#[async_trait]
impl PriceSource for CbrClient {
    fn name(&self) -> &'static str {
        "cbr"
    }

    #[instrument(
        name = "CbrPrices",
        skip(self, range),
        fields(commodity = %commodity, from = %range.from, till = %range.till)
    )]
    async fn prices(&self, commodity: &str, range: &DateRange) -> Result<Vec<PriceRecord>> {
        let id = self.resolve_id(commodity).await?;
        debug!("Resolved {} to {}", commodity, id);

        let url = format!("{}{}", self.base_url, SERIES_PATH);
        let query = [
            ("date_req1", range.from.format(QUERY_DATE_FORMAT).to_string()),
            ("date_req2", range.till.format(QUERY_DATE_FORMAT).to_string()),
            ("VAL_NM_RQ", id),
        ];
        let text = fetch_document(&self.client, "rate series", &url, &query).await?;
        let series: RateSeries = parse_xml("rate series", &text)?;

        let prices = series
            .records
            .iter()
            .map(|record| record.to_price(commodity))
            .collect::<Result<Vec<_>>>()?;

        debug!(count = prices.len(), "Fetched central bank rates");
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1251;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CATALOG: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<Valuta name="Foreign Currency Market Lib">
    <Item ID="R01010">
        <Name>Австралийский доллар</Name>
        <EngName>Australian Dollar</EngName>
        <Nominal>1</Nominal>
        <ParentCode>R01010    </ParentCode>
        <ISO_Num_Code>36</ISO_Num_Code>
        <ISO_Char_Code>AUD</ISO_Char_Code>
    </Item>
    <Item ID="R01235">
        <Name>Доллар США</Name>
        <EngName>US Dollar</EngName>
        <Nominal>1</Nominal>
        <ParentCode>R01235    </ParentCode>
        <ISO_Num_Code>840</ISO_Num_Code>
        <ISO_Char_Code>USD</ISO_Char_Code>
    </Item>
    <Item ID="R01135">
        <Name>Венгерский форинт</Name>
        <EngName>Hungarian Forint</EngName>
        <Nominal>100</Nominal>
        <ParentCode>R01135    </ParentCode>
        <ISO_Num_Code>348</ISO_Num_Code>
        <ISO_Char_Code>HUF</ISO_Char_Code>
    </Item>
</Valuta>"#;

    fn windows_1251(text: &str) -> Vec<u8> {
        let (bytes, _, _) = WINDOWS_1251.encode(text);
        bytes.into_owned()
    }

    fn range(from: &str, till: &str) -> DateRange {
        DateRange::parse(from, till).unwrap()
    }

    async fn mount_catalog(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(CATALOG_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(windows_1251(CATALOG)))
            .mount(mock_server)
            .await;
    }

    async fn mount_series(mock_server: &MockServer, id: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(SERIES_PATH))
            .and(query_param("VAL_NM_RQ", id))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(windows_1251(body)))
            .mount(mock_server)
            .await;
    }

    fn client(mock_server: &MockServer) -> CbrClient {
        CbrClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;

        Mock::given(method("GET"))
            .and(path(SERIES_PATH))
            .and(query_param("date_req1", "01/03/2024"))
            .and(query_param("date_req2", "05/03/2024"))
            .and(query_param("VAL_NM_RQ", "R01235"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(windows_1251(
                r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs ID="R01235" DateRange1="01.03.2024" DateRange2="05.03.2024" name="Foreign Currency Market Dynamic">
    <Record Date="01.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,3336</Value></Record>
    <Record Date="02.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,1600</Value></Record>
    <Record Date="05.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,0539</Value></Record>
</ValCurs>"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let query = range("2024-03-01", "2024-03-05");
        let prices = client(&mock_server).prices("USD", &query).await.unwrap();

        assert_eq!(prices.len(), 3);
        assert!(prices.iter().all(|p| p.commodity == "USD"));
        assert!(
            prices
                .iter()
                .all(|p| p.date >= query.from && p.date <= query.till)
        );
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(prices[0].price, dec!(91.3336));
        assert_eq!(prices[1].price.to_string(), "91.16");
        assert_eq!(prices[2].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[tokio::test]
    async fn test_rate_divided_by_nominal_is_exact() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;
        mount_series(
            &mock_server,
            "R01135",
            r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs ID="R01135" name="Foreign Currency Market Dynamic">
    <Record Date="12.01.2024" Id="R01135"><Nominal>100</Nominal><Value>123,4567</Value></Record>
</ValCurs>"#,
        )
        .await;

        let prices = client(&mock_server)
            .prices("HUF", &range("2024-01-12", "2024-01-12"))
            .await
            .unwrap();

        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].price, dec!(1.234567));
        assert_eq!(prices[0].price.to_string(), "1.234567");
    }

    #[tokio::test]
    async fn test_unknown_commodity_skips_series_request() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;

        Mock::given(method("GET"))
            .and(path(SERIES_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let result = client(&mock_server)
            .prices("ZZZ", &range("2024-01-01", "2024-01-31"))
            .await;

        match result {
            Err(PriceError::UnknownCommodity(symbol)) => assert_eq!(symbol, "ZZZ"),
            other => panic!("Expected UnknownCommodity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_series() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;
        mount_series(
            &mock_server,
            "R01235",
            r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs ID="R01235" DateRange1="06.01.2024" DateRange2="07.01.2024" name="Foreign Currency Market Dynamic"></ValCurs>"#,
        )
        .await;

        let prices = client(&mock_server)
            .prices("USD", &range("2024-01-06", "2024-01-07"))
            .await
            .unwrap();
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_value_aborts_whole_call() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;
        mount_series(
            &mock_server,
            "R01235",
            r#"<ValCurs ID="R01235">
    <Record Date="01.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,3336</Value></Record>
    <Record Date="02.03.2024" Id="R01235"><Nominal>1</Nominal><Value>n/a</Value></Record>
</ValCurs>"#,
        )
        .await;

        let result = client(&mock_server)
            .prices("USD", &range("2024-03-01", "2024-03-02"))
            .await;

        match result {
            Err(PriceError::FieldParse { field, value, .. }) => {
                assert_eq!(field, "Value");
                assert_eq!(value, "n/a");
            }
            other => panic!("Expected FieldParse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_date_is_field_error() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;
        mount_series(
            &mock_server,
            "R01235",
            r#"<ValCurs ID="R01235">
    <Record Date="2024-03-01" Id="R01235"><Nominal>1</Nominal><Value>91,3336</Value></Record>
</ValCurs>"#,
        )
        .await;

        let result = client(&mock_server)
            .prices("USD", &range("2024-03-01", "2024-03-02"))
            .await;
        assert!(matches!(
            result,
            Err(PriceError::FieldParse { field: "Date", .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_nominal_is_field_error() {
        let mock_server = MockServer::start().await;
        mount_catalog(&mock_server).await;
        mount_series(
            &mock_server,
            "R01235",
            r#"<ValCurs ID="R01235">
    <Record Date="01.03.2024" Id="R01235"><Nominal>0</Nominal><Value>91,3336</Value></Record>
</ValCurs>"#,
        )
        .await;

        let result = client(&mock_server)
            .prices("USD", &range("2024-03-01", "2024-03-02"))
            .await;
        assert!(matches!(
            result,
            Err(PriceError::FieldParse {
                field: "Nominal",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_catalog_with_unexpected_shape_is_decode_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CATALOG_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<Valuta><Item><ISO_Char_Code>USD</ISO_Char_Code></Item></Valuta>",
            ))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server)
            .prices("USD", &range("2024-03-01", "2024-03-02"))
            .await;
        assert!(matches!(result, Err(PriceError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CATALOG_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server)
            .prices("USD", &range("2024-03-01", "2024-03-02"))
            .await;
        assert!(matches!(result, Err(PriceError::Network(_))));
    }

    #[tokio::test]
    async fn test_hung_upstream_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CATALOG_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(windows_1251(CATALOG))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = CbrClient::new(&mock_server.uri(), Duration::from_millis(100)).unwrap();
        let result = client
            .prices("USD", &range("2024-03-01", "2024-03-02"))
            .await;

        match result {
            Err(PriceError::Network(e)) => assert!(e.is_timeout()),
            other => panic!("Expected a timeout, got {other:?}"),
        }
    }
}
