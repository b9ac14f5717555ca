// Brokerage REST wire models
//
// Numeric fields arrive as strings and are parsed at the edge.

use crate::error::ApiError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Body of `POST oauth2/tokenP`
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub appkey: &'a str,
    pub appsecret: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashKeyResponse {
    #[serde(rename = "HASH")]
    pub hash: String,
}

/// `inquire-price` response
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    pub output: QuoteOutput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteOutput {
    /// Current price
    pub stck_prpr: String,
}

/// `inquire-daily-price` response, newest row first
#[derive(Debug, Clone, Deserialize)]
pub struct DailyPriceResponse {
    pub output: Vec<DailyPriceRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyPriceRow {
    pub stck_oprc: String,
    pub stck_hgpr: String,
    pub stck_lwpr: String,
}

/// `inquire-balance` response: holdings in `output1`, totals in `output2`
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    #[serde(default)]
    pub output1: Vec<HoldingRow>,
    #[serde(default)]
    pub output2: Vec<ValuationRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldingRow {
    pub pdno: String,
    #[serde(default)]
    pub prdt_name: String,
    pub hldg_qty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValuationRow {
    pub scts_evlu_amt: String,
    pub evlu_pfls_smtl_amt: String,
    pub tot_evlu_amt: String,
}

/// `inquire-psbl-order` response
#[derive(Debug, Clone, Deserialize)]
pub struct OrderableCashResponse {
    pub output: OrderableCashOutput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderableCashOutput {
    pub ord_psbl_cash: String,
}

/// Cash order body for `order-cash`. Field order is the wire order, and the
/// hashkey is computed over exactly this serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "CANO")]
    pub cano: String,
    #[serde(rename = "ACNT_PRDT_CD")]
    pub acnt_prdt_cd: String,
    #[serde(rename = "PDNO")]
    pub pdno: String,
    #[serde(rename = "ORD_DVSN")]
    pub ord_dvsn: String,
    #[serde(rename = "ORD_QTY")]
    pub ord_qty: String,
    #[serde(rename = "ORD_UNPR")]
    pub ord_unpr: String,
}

/// Market orders go out with division "01" and no price.
pub const MARKET_ORDER_DIVISION: &str = "01";
pub const MARKET_ORDER_PRICE: &str = "0";

impl OrderRequest {
    pub fn market(account_no: &str, product_code: &str, code: &str, quantity: u64) -> Self {
        Self {
            cano: account_no.to_string(),
            acnt_prdt_cd: product_code.to_string(),
            pdno: code.to_string(),
            ord_dvsn: MARKET_ORDER_DIVISION.to_string(),
            ord_qty: quantity.to_string(),
            ord_unpr: MARKET_ORDER_PRICE.to_string(),
        }
    }
}

/// Response of `order-cash`; `rt_cd == "0"` means accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub rt_cd: String,
    #[serde(default)]
    pub msg1: Option<String>,
    #[serde(default)]
    pub output: Option<OrderResponseOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponseOutput {
    #[serde(rename = "ODNO", default)]
    pub odno: Option<String>,
}

pub const SUCCESS_CODE: &str = "0";

impl OrderResponse {
    pub fn is_success(&self) -> bool {
        self.rt_cd == SUCCESS_CODE
    }
}

/// Parse a numeric string field, tolerating surrounding whitespace
pub fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, ApiError> {
    Decimal::from_str(value.trim()).map_err(|_| ApiError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parse a share count; the API sometimes reports them as "12.0000"
pub fn parse_quantity(field: &'static str, value: &str) -> Result<u64, ApiError> {
    let trimmed = value.trim();
    if let Ok(q) = trimmed.parse::<u64>() {
        return Ok(q);
    }
    let d = parse_decimal(field, trimmed)?;
    d.trunc().to_u64().ok_or_else(|| ApiError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
