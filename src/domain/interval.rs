use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::utils::TimeUtils;

/// Kline widths Binance accepts. The string form is the exchange's shorthand (`1h`, `1d`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    AsRefStr,
    Default,
)]
pub enum Interval {
    #[strum(serialize = "1s")]
    #[serde(rename = "1s")]
    S1,
    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    Min1,
    #[strum(serialize = "3m")]
    #[serde(rename = "3m")]
    Min3,
    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    Min5,
    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    Min15,
    #[strum(serialize = "30m")]
    #[serde(rename = "30m")]
    Min30,
    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    H1,
    #[strum(serialize = "2h")]
    #[serde(rename = "2h")]
    H2,
    #[strum(serialize = "4h")]
    #[serde(rename = "4h")]
    H4,
    #[strum(serialize = "6h")]
    #[serde(rename = "6h")]
    H6,
    #[strum(serialize = "8h")]
    #[serde(rename = "8h")]
    H8,
    #[strum(serialize = "12h")]
    #[serde(rename = "12h")]
    H12,
    #[default]
    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    D1,
    #[strum(serialize = "3d")]
    #[serde(rename = "3d")]
    D3,
    #[strum(serialize = "1w")]
    #[serde(rename = "1w")]
    W1,
    /// Calendar month on the exchange; approximated as 30 days for window planning.
    #[strum(serialize = "1M")]
    #[serde(rename = "1M")]
    Month1,
}

impl Interval {
    pub fn duration_ms(self) -> i64 {
        use TimeUtils as T;
        match self {
            Self::S1 => T::MS_IN_S,
            Self::Min1 => T::MS_IN_MIN,
            Self::Min3 => T::MS_IN_3_MIN,
            Self::Min5 => T::MS_IN_5_MIN,
            Self::Min15 => T::MS_IN_15_MIN,
            Self::Min30 => T::MS_IN_30_MIN,
            Self::H1 => T::MS_IN_H,
            Self::H2 => T::MS_IN_2_H,
            Self::H4 => T::MS_IN_4_H,
            Self::H6 => T::MS_IN_6_H,
            Self::H8 => T::MS_IN_8_H,
            Self::H12 => T::MS_IN_12_H,
            Self::D1 => T::MS_IN_D,
            Self::D3 => T::MS_IN_3_D,
            Self::W1 => T::MS_IN_W,
            Self::Month1 => T::MS_IN_1_M,
        }
    }
}
