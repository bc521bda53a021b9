use serde::{Deserialize, Serialize};

/// Consumption aggregated by billing tag. Tokens without a tag are
/// aggregated under their owner's group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingTagStatistic {
    pub billing_tag: String,
    #[serde(default)]
    pub request_count: i64,
    #[serde(default)]
    pub quota: i64,
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    /// Milliseconds.
    #[serde(default)]
    pub request_time: i64,
}

/// Request count per (billing tag, model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsageByBillingTag {
    pub billing_tag: String,
    pub model_name: String,
    #[serde(default)]
    pub request_count: i64,
}

/// The statistics endpoint puts `model_usage` beside `data`, outside the
/// usual envelope payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingTagReportEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "super::envelope::null_as_empty")]
    pub data: Vec<BillingTagStatistic>,
    #[serde(default, deserialize_with = "super::envelope::null_as_empty")]
    pub model_usage: Vec<ModelUsageByBillingTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillingTagReport {
    pub statistics: Vec<BillingTagStatistic>,
    pub model_usage: Vec<ModelUsageByBillingTag>,
}

impl BillingTagReport {
    pub fn total_quota(&self) -> i64 {
        self.statistics.iter().map(|s| s.quota).sum()
    }

    pub fn models_for<'a>(
        &'a self,
        billing_tag: &'a str,
    ) -> impl Iterator<Item = &'a ModelUsageByBillingTag> + 'a {
        self.model_usage
            .iter()
            .filter(move |u| u.billing_tag == billing_tag)
    }
}
