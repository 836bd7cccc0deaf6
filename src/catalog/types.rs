//! Wire types for the solved.ac v3 catalog API
//!
//! Only the fields the crawlers persist are modelled; unknown fields are ignored.

use serde::Deserialize;

/// One page of `GET /search/problem`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub items: Vec<ApiProblem>,
}

/// A problem as returned by search and `GET /problem/show`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProblem {
    pub problem_id: i64,
    #[serde(default)]
    pub title_ko: String,
    #[serde(default)]
    pub titles: Vec<ApiTitle>,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub accepted_user_count: i64,
    #[serde(default)]
    pub average_tries: Option<f64>,
    #[serde(default)]
    pub tags: Vec<ApiTag>,
}

impl ApiProblem {
    /// English title variant, if the catalog has a non-empty one
    pub fn title_en(&self) -> Option<&str> {
        self.titles
            .iter()
            .find(|t| t.language == "en")
            .map(|t| t.title.as_str())
            .filter(|title| !title.is_empty())
    }

    pub fn average_tries_or_zero(&self) -> f64 {
        self.average_tries.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiTitle {
    pub language: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTag {
    pub key: String,
    #[serde(default)]
    pub display_names: Vec<ApiDisplayName>,
    #[serde(default)]
    pub is_meta: bool,
}

impl ApiTag {
    fn display_name(&self, language: &str) -> Option<&str> {
        self.display_names
            .iter()
            .find(|n| n.language == language)
            .map(|n| n.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Korean display name, falling back to the tag key
    pub fn name_ko(&self) -> &str {
        self.display_name("ko").unwrap_or(&self.key)
    }

    pub fn name_en(&self) -> Option<&str> {
        self.display_name("en")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDisplayName {
    pub language: String,
    pub name: String,
}

/// A node of the contest-group hierarchy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestGroup {
    pub contest_group_id: i64,
    #[serde(default)]
    pub contest_group_name: String,
    #[serde(default)]
    pub contest_group_full_name: String,
    #[serde(default)]
    pub contest_group_tag_name: Option<String>,
    #[serde(default)]
    pub contest_group_problem_count: i64,
    #[serde(default)]
    pub contest_group_available_problem_count: i64,
    #[serde(default)]
    pub contest_group_open_problem_count: i64,
    #[serde(default)]
    pub parent_contest_group_id: Option<i64>,
}

impl ContestGroup {
    /// Reported parent, with the synthetic root (0) mapped to `None`
    pub fn parent_id(&self) -> Option<i64> {
        self.parent_contest_group_id.filter(|id| *id != 0)
    }
}

/// `GET /problem/contest/group`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestGroupDetail {
    pub contest_group: ContestGroup,
    #[serde(default)]
    pub child_groups: Vec<ContestGroup>,
    #[serde(default)]
    pub child_contests: Vec<ApiContest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiContest {
    pub contest_id: i64,
    #[serde(default)]
    pub contest_name: String,
    #[serde(default)]
    pub contest_group_id: Option<i64>,
}

/// `GET /problem/contest`
#[derive(Debug, Clone, Deserialize)]
pub struct ContestDetail {
    pub contest: ApiContest,
    #[serde(default)]
    pub problems: Vec<ApiProblemRef>,
}

/// A problem as referenced from a contest; everything but the id may be missing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProblemRef {
    pub problem_id: i64,
    #[serde(default)]
    pub title_ko: Option<String>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub accepted_user_count: Option<i64>,
    #[serde(default)]
    pub average_tries: Option<f64>,
}
