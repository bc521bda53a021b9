use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A billing group the operator may assign a token to.
#[derive(Debug, Clone, Deserialize)]
pub struct UserGroup {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub ratio: f64,
}

/// Option shown by the token editor's group picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupOption {
    pub label: String,
    pub value: String,
}

/// Build picker options from the `symbol -> group` map, ordered by symbol.
pub fn group_options(groups: &HashMap<String, UserGroup>) -> Vec<GroupOption> {
    let mut options: Vec<GroupOption> = groups
        .values()
        .map(|g| GroupOption {
            label: format!("{} (ratio: {})", g.name, g.ratio),
            value: g.symbol.clone(),
        })
        .collect();
    options.sort_by(|a, b| a.value.cmp(&b.value));
    options
}
