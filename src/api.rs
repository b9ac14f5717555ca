// Brokerage Open API client (token, hashkey, quotes, balances, cash orders)

use crate::broker::Broker;
use crate::config::Credentials;
use crate::error::ApiError;
use crate::models::{
    parse_decimal, parse_quantity, BalanceResponse, DailyPriceResponse, HashKeyResponse,
    OrderRequest, OrderResponse, OrderableCashResponse, QuoteResponse, TokenRequest, TokenResponse,
};
use crate::types::{AccountBalance, DailyRange, Holding, OrderOutcome, OrderSide, Session, Valuation};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const TOKEN_PATH: &str = "oauth2/tokenP";
const HASHKEY_PATH: &str = "uapi/hashkey";
const PRICE_PATH: &str = "uapi/domestic-stock/v1/quotations/inquire-price";
const DAILY_PRICE_PATH: &str = "uapi/domestic-stock/v1/quotations/inquire-daily-price";
const BALANCE_PATH: &str = "uapi/domestic-stock/v1/trading/inquire-balance";
const ORDERABLE_PATH: &str = "uapi/domestic-stock/v1/trading/inquire-psbl-order";
const ORDER_PATH: &str = "uapi/domestic-stock/v1/trading/order-cash";

/// Transaction ids, one per endpoint/side
mod tr_id {
    pub const PRICE: &str = "FHKST01010100";
    pub const DAILY_PRICE: &str = "FHKST01010400";
    pub const BALANCE: &str = "TTTC8434R";
    pub const ORDERABLE: &str = "TTTC8908R";
    pub const BUY: &str = "TTTC0802U";
    pub const SELL: &str = "TTTC0801U";
}

/// Domestic stock market division code
const MARKET_DIV: &str = "J";

/// Reference instrument for the orderable-cash inquiry
const ORDERABLE_PROBE_CODE: &str = "005930";
const ORDERABLE_PROBE_PRICE: &str = "65500";

pub struct KisApi {
    client: Client,
    url_base: String,
    credentials: Credentials,
    session: Option<Session>,
}

impl KisApi {
    pub fn new(url_base: String, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url_base: url_base.trim_end_matches('/').to_string(),
            credentials,
            session: None,
        })
    }

    /// Client with an already issued session; nothing is fetched
    pub fn with_session(
        url_base: String,
        credentials: Credentials,
        session: Session,
        timeout: Duration,
    ) -> Result<Self> {
        let mut api = Self::new(url_base, credentials, timeout)?;
        api.session = Some(session);
        Ok(api)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url_base, path)
    }

    /// Exchange app credentials for the day's access token.
    /// The token is stored on the client and used by every later call.
    pub async fn authenticate(&mut self) -> Result<&Session> {
        let body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.credentials.app_key,
            appsecret: &self.credentials.app_secret,
        };
        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("token request failed")?;
        let token: TokenResponse = Self::read_json(TOKEN_PATH, response).await?;

        info!(
            "🔑 Access token issued (type={}, expires_in={:?}s)",
            token.token_type.as_deref().unwrap_or("Bearer"),
            token.expires_in
        );
        let session = self.session.insert(Session {
            access_token: token.access_token,
            issued_at: Utc::now(),
        });
        Ok(&*session)
    }

    /// Attach the session token, app credentials and transaction id
    pub fn authorized(&self, request: RequestBuilder, tr_id: &str) -> Result<RequestBuilder, ApiError> {
        let session = self
            .session
            .as_ref()
            .ok_or(ApiError::NotAuthenticated("authorized request"))?;
        Ok(request
            .header("Content-Type", "application/json")
            .header("authorization", format!("Bearer {}", session.access_token))
            .header("appKey", &self.credentials.app_key)
            .header("appSecret", &self.credentials.app_secret)
            .header("tr_id", tr_id)
            .header("custtype", "P"))
    }

    async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        serde_json::from_str(&text).with_context(|| format!("Invalid response format from {}", path))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, tr_id: &str, params: &[(&str, &str)]) -> Result<T> {
        let request = self.authorized(self.client.get(self.url(path)), tr_id)?.query(params);
        let response = request.send().await.with_context(|| format!("GET {} failed", path))?;
        Self::read_json(path, response).await
    }

    /// Integrity hash for an exact request body
    pub async fn hashkey(&self, body: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url(HASHKEY_PATH))
            .header("content-Type", "application/json")
            .header("appKey", &self.credentials.app_key)
            .header("appSecret", &self.credentials.app_secret)
            .body(body.to_string())
            .send()
            .await
            .context("hashkey request failed")?;
        let hash: HashKeyResponse = Self::read_json(HASHKEY_PATH, response).await?;
        Ok(hash.hash)
    }

    fn account_params(&self) -> [(&str, &str); 2] {
        [
            ("CANO", self.credentials.account_no.as_str()),
            ("ACNT_PRDT_CD", self.credentials.account_product_code.as_str()),
        ]
    }
}

impl Broker for KisApi {
    async fn get_current_price(&self, code: &str) -> Result<Decimal> {
        let params = [("fid_cond_mrkt_div_code", MARKET_DIV), ("fid_input_iscd", code)];
        let quote: QuoteResponse = self.get_json(PRICE_PATH, tr_id::PRICE, &params).await?;
        Ok(parse_decimal("stck_prpr", &quote.output.stck_prpr)?)
    }

    async fn get_daily_range(&self, code: &str) -> Result<DailyRange> {
        let params = [
            ("fid_cond_mrkt_div_code", MARKET_DIV),
            ("fid_input_iscd", code),
            ("fid_org_adj_prc", "1"),
            ("fid_period_div_code", "D"),
        ];
        let daily: DailyPriceResponse = self.get_json(DAILY_PRICE_PATH, tr_id::DAILY_PRICE, &params).await?;
        let missing = |field| ApiError::MissingField { path: DAILY_PRICE_PATH.to_string(), field };
        let today = daily.output.first().ok_or_else(|| missing("output[0]"))?;
        let previous = daily.output.get(1).ok_or_else(|| missing("output[1]"))?;

        Ok(DailyRange {
            open: parse_decimal("stck_oprc", &today.stck_oprc)?,
            prev_high: parse_decimal("stck_hgpr", &previous.stck_hgpr)?,
            prev_low: parse_decimal("stck_lwpr", &previous.stck_lwpr)?,
        })
    }

    async fn get_orderable_cash(&self) -> Result<Decimal> {
        let [cano, acnt] = self.account_params();
        let params = [
            cano,
            acnt,
            ("PDNO", ORDERABLE_PROBE_CODE),
            ("ORD_UNPR", ORDERABLE_PROBE_PRICE),
            ("ORD_DVSN", "01"),
            ("CMA_EVLU_AMT_ICLD_YN", "Y"),
            ("OVRS_ICLD_YN", "Y"),
        ];
        let cash: OrderableCashResponse = self.get_json(ORDERABLE_PATH, tr_id::ORDERABLE, &params).await?;
        Ok(parse_decimal("ord_psbl_cash", &cash.output.ord_psbl_cash)?)
    }

    async fn get_balance(&self) -> Result<AccountBalance> {
        let [cano, acnt] = self.account_params();
        let params = [
            cano,
            acnt,
            ("AFHR_FLPR_YN", "N"),
            ("OFL_YN", ""),
            ("INQR_DVSN", "02"),
            ("UNPR_DVSN", "01"),
            ("FUND_STTL_ICLD_YN", "N"),
            ("FNCG_AMT_AUTO_RDPT_YN", "N"),
            ("PRCS_DVSN", "01"),
            ("CTX_AREA_FK100", ""),
            ("CTX_AREA_NK100", ""),
        ];
        let balance: BalanceResponse = self.get_json(BALANCE_PATH, tr_id::BALANCE, &params).await?;
        balance_from_response(balance)
    }

    async fn submit_order(&self, code: &str, quantity: u64, side: OrderSide) -> Result<OrderOutcome> {
        if quantity == 0 {
            return Err(ApiError::InvalidQuantity(quantity).into());
        }
        let order = OrderRequest::market(
            &self.credentials.account_no,
            &self.credentials.account_product_code,
            code,
            quantity,
        );
        // The hash must cover the exact bytes we send
        let body = serde_json::to_string(&order)?;
        let hashkey = self.hashkey(&body).await?;
        let tr = match side {
            OrderSide::Buy => tr_id::BUY,
            OrderSide::Sell => tr_id::SELL,
        };

        debug!("Submitting {} {} x{} ({})", side, code, quantity, body);
        let request = self
            .authorized(self.client.post(self.url(ORDER_PATH)), tr)?
            .header("hashkey", hashkey)
            .body(body);
        let response = request.send().await.context("order request failed")?;
        let order_response: OrderResponse = Self::read_json(ORDER_PATH, response).await?;
        Ok(outcome_from_response(order_response))
    }
}

pub fn balance_from_response(balance: BalanceResponse) -> Result<AccountBalance> {
    let mut holdings = Vec::new();
    for row in balance.output1 {
        let quantity = parse_quantity("hldg_qty", &row.hldg_qty)?;
        if quantity > 0 {
            holdings.push(Holding { code: row.pdno, name: row.prdt_name, quantity });
        }
    }

    let valuation = match balance.output2.first() {
        Some(v) => Valuation {
            securities_value: parse_decimal("scts_evlu_amt", &v.scts_evlu_amt)?,
            profit_loss: parse_decimal("evlu_pfls_smtl_amt", &v.evlu_pfls_smtl_amt)?,
            total_value: parse_decimal("tot_evlu_amt", &v.tot_evlu_amt)?,
        },
        None => Valuation::default(),
    };

    Ok(AccountBalance { holdings, valuation })
}

pub fn outcome_from_response(response: OrderResponse) -> OrderOutcome {
    let message = response.msg1.clone().unwrap_or_default();
    if response.is_success() {
        OrderOutcome::Accepted {
            order_no: response.output.and_then(|o| o.odno),
            message,
        }
    } else {
        OrderOutcome::Rejected { code: response.rt_cd, message }
    }
}
