use super::{
    ANY_VALUE, CATEGORY_KEY, CLASSIFIER_KEY, DEFAULT_CATEGORY, ENABLED_KEY, GROUP_KEY, Url,
    VERSION_KEY,
};

/// 判断 `candidate` 是否满足查询 `query`
///
/// 查询中缺省的参数等同于通配；`group` 与 `category` 支持逗号分隔的候选列表。
pub fn is_match(query: &Url, candidate: &Url) -> bool {
    if !matches_exact_or_any(query.protocol(), candidate.protocol()) {
        return false;
    }
    if !matches_exact_or_any(query.host(), candidate.host()) {
        return false;
    }
    if let Some(port) = query.port() {
        if candidate.port() != Some(port) {
            return false;
        }
    }

    let query_interface = query.service_interface();
    if query_interface != ANY_VALUE && query_interface != candidate.service_interface() {
        return false;
    }

    if !matches_category(
        query.parameter_or(CATEGORY_KEY, DEFAULT_CATEGORY),
        candidate.parameter_or(CATEGORY_KEY, DEFAULT_CATEGORY),
    ) {
        return false;
    }

    // 被禁用的端点只对显式 enabled=* 的查询可见
    if candidate.parameter(ENABLED_KEY) == Some("false")
        && query.parameter(ENABLED_KEY) != Some(ANY_VALUE)
    {
        return false;
    }

    matches_list(query.parameter(GROUP_KEY), candidate.parameter(GROUP_KEY))
        && matches_optional(query.parameter(VERSION_KEY), candidate.parameter(VERSION_KEY))
        && matches_optional(
            query.parameter(CLASSIFIER_KEY),
            candidate.parameter(CLASSIFIER_KEY),
        )
}

fn matches_exact_or_any(query: &str, candidate: &str) -> bool {
    query.is_empty() || query == ANY_VALUE || query == candidate
}

fn matches_optional(query: Option<&str>, candidate: Option<&str>) -> bool {
    match query {
        None => true,
        Some(ANY_VALUE) => true,
        Some(value) => candidate == Some(value),
    }
}

fn matches_list(query: Option<&str>, candidate: Option<&str>) -> bool {
    match query {
        None => true,
        Some(ANY_VALUE) => true,
        Some(value) => candidate
            .is_some_and(|candidate| value.split(',').any(|item| item.trim() == candidate)),
    }
}

fn matches_category(query: &str, candidate: &str) -> bool {
    query == ANY_VALUE || query.split(',').any(|item| item.trim() == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(extra: &[(&str, &str)]) -> Url {
        extra.iter().fold(
            Url::new("svc", "10.0.0.1", 20880, "com.acme.Foo"),
            |url, (k, v)| url.with_parameter(*k, *v),
        )
    }

    #[test]
    fn absent_query_parameters_are_wildcards() {
        let query = Url::parse("svc://*:*/com.acme.Foo").unwrap();
        assert!(is_match(&query, &provider(&[("version", "1.0"), ("group", "g1")])));
    }

    #[test]
    fn version_must_match_when_given() {
        let query = Url::parse("svc://*/com.acme.Foo?version=2.0").unwrap();
        assert!(!is_match(&query, &provider(&[("version", "1.0")])));
        assert!(is_match(&query, &provider(&[("version", "2.0")])));
    }

    #[test]
    fn group_list_contains_candidate() {
        let query = Url::new("svc", "*", 0, "com.acme.Foo").with_parameter("group", "g1,g2");
        assert!(is_match(&query, &provider(&[("group", "g2")])));
        assert!(!is_match(&query, &provider(&[("group", "g3")])));
        assert!(!is_match(&query, &provider(&[])));
    }

    #[test]
    fn disabled_endpoint_needs_explicit_wildcard() {
        let disabled = provider(&[("enabled", "false")]);
        let query = Url::new("svc", "*", 0, "com.acme.Foo");
        assert!(!is_match(&query, &disabled));
        assert!(is_match(&query.with_parameter("enabled", "*"), &disabled));
    }

    #[test]
    fn category_defaults_to_providers() {
        let consumers = provider(&[("category", "consumers")]);
        let query = Url::new("svc", "*", 0, "com.acme.Foo");
        assert!(!is_match(&query, &consumers));
        assert!(is_match(
            &query.with_parameter("category", "providers,consumers"),
            &consumers
        ));
    }

    #[test]
    fn interface_wildcard_and_port() {
        let query = Url::new("svc", "*", 20881, "*");
        assert!(!is_match(&query, &provider(&[])));
        let query = Url::new("", "", 20880, "*");
        assert!(is_match(&query, &provider(&[])));
    }
}
