//! Metric keys the market-data node fetches and personas consume

/// Latest traded price
pub const CURRENT_PRICE: &str = "current_price";
/// Daily closes, oldest first
pub const PRICE_HISTORY: &str = "price_history";
/// Market capitalization
pub const MARKET_CAP: &str = "market_cap";
/// Trailing return on equity, as a fraction
pub const RETURN_ON_EQUITY: &str = "return_on_equity";
/// Debt to equity ratio
pub const DEBT_TO_EQUITY: &str = "debt_to_equity";
/// Operating margin, as a fraction
pub const OPERATING_MARGIN: &str = "operating_margin";
/// Current ratio
pub const CURRENT_RATIO: &str = "current_ratio";
/// Year-over-year revenue growth, as a fraction
pub const REVENUE_GROWTH: &str = "revenue_growth";
/// Year-over-year earnings growth, as a fraction
pub const EARNINGS_GROWTH: &str = "earnings_growth";
/// Trailing price-to-earnings ratio
pub const PE_RATIO: &str = "pe_ratio";
/// Trailing free cash flow
pub const FREE_CASH_FLOW: &str = "free_cash_flow";
/// Trailing net income
pub const NET_INCOME: &str = "net_income";
/// Trailing depreciation and amortization
pub const DEPRECIATION_AND_AMORTIZATION: &str = "depreciation_and_amortization";
/// Trailing capital expenditure
pub const CAPITAL_EXPENDITURE: &str = "capital_expenditure";
/// Change in working capital over the trailing period
pub const WORKING_CAPITAL_CHANGE: &str = "working_capital_change";
/// Total assets
pub const TOTAL_ASSETS: &str = "total_assets";
/// Total liabilities
pub const TOTAL_LIABILITIES: &str = "total_liabilities";
/// 52-week high price
pub const WEEK_52_HIGH: &str = "week_52_high";
/// Total insider purchase value over the trailing 90 days
pub const INSIDER_BUY_VALUE: &str = "insider_buy_value";
/// Total insider sale value over the trailing 90 days
pub const INSIDER_SELL_VALUE: &str = "insider_sell_value";
/// Aggregate news tone in `[-1, 1]` over the trailing 30 days
pub const NEWS_SENTIMENT: &str = "news_sentiment";

/// Metrics the market-data node refuses to run without; everything else is
/// fetched best-effort and stored as null when the provider has no value
pub const REQUIRED: &[&str] = &[CURRENT_PRICE, PRICE_HISTORY];

/// The full metric set the standard committee consumes
pub fn standard_set() -> Vec<String> {
    [
        CURRENT_PRICE,
        PRICE_HISTORY,
        MARKET_CAP,
        RETURN_ON_EQUITY,
        DEBT_TO_EQUITY,
        OPERATING_MARGIN,
        CURRENT_RATIO,
        REVENUE_GROWTH,
        EARNINGS_GROWTH,
        PE_RATIO,
        FREE_CASH_FLOW,
        NET_INCOME,
        DEPRECIATION_AND_AMORTIZATION,
        CAPITAL_EXPENDITURE,
        WORKING_CAPITAL_CHANGE,
        TOTAL_ASSETS,
        TOTAL_LIABILITIES,
        WEEK_52_HIGH,
        INSIDER_BUY_VALUE,
        INSIDER_SELL_VALUE,
        NEWS_SENTIMENT,
    ]
    .iter()
    .map(|key| (*key).to_string())
    .collect()
}
