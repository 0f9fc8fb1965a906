//! Endpoint descriptor module
//!
//! - `Url`: immutable endpoint/query descriptor with a canonical string form
//! - `matching`: the predicate deciding whether a registered endpoint satisfies a query
//! - `error`: parse errors

pub mod error;
pub mod matching;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use error::UrlError;
pub use matching::is_match;

/// 通配值
pub const ANY_VALUE: &str = "*";
pub const INTERFACE_KEY: &str = "interface";
pub const CATEGORY_KEY: &str = "category";
pub const DEFAULT_CATEGORY: &str = "providers";
pub const ENABLED_KEY: &str = "enabled";
pub const GROUP_KEY: &str = "group";
pub const VERSION_KEY: &str = "version";
pub const CLASSIFIER_KEY: &str = "classifier";

/// 服务端点描述符
///
/// 参数按 key 排序保存，因此同一个端点总是得到同一个规范字符串，
/// 规范字符串即为注册表中的相等性 key。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Url {
    protocol: String,
    host: String,
    port: Option<u16>,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl Url {
    /// 端口为 0 表示未指定
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port: (port != 0).then_some(port),
            path: normalize_path(&path.into()),
            parameters: BTreeMap::new(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, UrlError> {
        s.parse()
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameter(key).unwrap_or(default)
    }

    /// 服务接口名：优先取 `interface` 参数，否则取路径
    pub fn service_interface(&self) -> &str {
        self.parameter(INTERFACE_KEY).unwrap_or(&self.path)
    }

    /// 空描述符，相当于“未提供”
    pub fn is_empty(&self) -> bool {
        self.protocol.is_empty()
            && self.host.is_empty()
            && self.port.is_none()
            && self.path.is_empty()
            && self.parameters.is_empty()
    }

    /// 规范字符串，用作注册集合与订阅表的 key
    pub fn to_full_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.protocol.is_empty() {
            write!(f, "{}://", escape(&self.protocol, PROTOCOL_RESERVED))?;
        }
        // 含 ':' 的主机（IPv6）用方括号包裹，避免与端口分隔符混淆
        if self.host.contains(':') {
            write!(f, "[{}]", escape(&self.host, BRACKETED_HOST_RESERVED))?;
        } else {
            f.write_str(&escape(&self.host, HOST_RESERVED))?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if !self.path.is_empty() {
            write!(f, "/{}", escape(&self.path, PATH_RESERVED))?;
        }
        let mut separator = '?';
        for (key, value) in &self.parameters {
            write!(
                f,
                "{separator}{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )?;
            separator = '&';
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(UrlError::Empty);
        }

        let (rest, query) = match s.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (s, None),
        };

        // 协议中的 '/' 已被转义，出现在第一个 '/' 之后的 "://" 属于路径
        let (protocol, rest) = match rest.split_once("://") {
            Some((protocol, rest)) if !protocol.contains('/') => (protocol, rest),
            _ => ("", rest),
        };

        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let (host, port) = split_authority(authority)?;

        let mut parameters = BTreeMap::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, pair));
                parameters.insert(decode(key)?, decode(value)?);
            }
        }

        Ok(Self {
            protocol: decode(protocol)?,
            host: decode(host)?,
            port,
            path: normalize_path(&decode(path)?),
            parameters,
        })
    }
}

// 各组成部分中需要转义的分隔符，'%' 总是转义
const PROTOCOL_RESERVED: &[char] = &[':', '/', '?'];
const HOST_RESERVED: &[char] = &[':', '/', '?', '[', ']'];
const BRACKETED_HOST_RESERVED: &[char] = &['/', '?', '[', ']'];
const PATH_RESERVED: &[char] = &['?'];

fn escape<'a>(s: &'a str, reserved: &[char]) -> Cow<'a, str> {
    let needs_escape = |c: char| c == '%' || reserved.contains(&c);
    if !s.contains(needs_escape) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if needs_escape(c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

// 主机:端口，`*` 或 0 视为未指定端口；`[...]` 为带冒号的主机
fn split_authority(authority: &str) -> Result<(&str, Option<u16>), UrlError> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| UrlError::InvalidHost(authority.to_string()))?;
        return match rest {
            "" => Ok((host, None)),
            _ => match rest.strip_prefix(':') {
                Some(port) => Ok((host, parse_port(port)?)),
                None => Err(UrlError::InvalidHost(authority.to_string())),
            },
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((authority, None)),
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

fn parse_port(port: &str) -> Result<Option<u16>, UrlError> {
    if port.is_empty() || port == ANY_VALUE {
        return Ok(None);
    }
    let port: u16 = port
        .parse()
        .map_err(|_| UrlError::InvalidPort(port.to_string()))?;
    Ok((port != 0).then_some(port))
}

fn decode(s: &str) -> Result<String, UrlError> {
    urlencoding::decode(s)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| UrlError::InvalidEncoding(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_sorted_in_canonical_form() {
        let url = Url::new("svc", "host", 20880, "Foo")
            .with_parameter("version", "1")
            .with_parameter("group", "a");
        assert_eq!(url.to_full_string(), "svc://host:20880/Foo?group=a&version=1");
    }

    #[test]
    fn wildcard_port_parses_as_unspecified() {
        let url = Url::parse("svc://*:*/Foo").unwrap();
        assert_eq!(url.host(), "*");
        assert_eq!(url.port(), None);
        assert_eq!(url.path(), "Foo");
    }

    #[test]
    fn canonical_string_round_trips_delimiters() {
        let cases = [
            Url::new("svc", "h", 1, "a?b"),
            Url::new("svc", "fe80::1", 0, "Foo"),
            Url::new("svc", "fe80::1", 8080, "Foo").with_parameter("version", "1"),
            Url::new("svc", "h", 0, "100%/a://b"),
            Url::new("s:v/c", "h[1]", 0, "Foo"),
            Url::new("", "", 0, "x://y"),
            Url::new("svc", "*", 0, "*"),
        ];
        for url in cases {
            let key = url.to_full_string();
            assert_eq!(Url::parse(&key).unwrap(), url, "key {key}");
        }
        assert_eq!(
            Url::new("svc", "fe80::1", 8080, "Foo").to_full_string(),
            "svc://[fe80::1]:8080/Foo"
        );
    }

    #[test]
    fn leading_slashes_are_normalized() {
        let parsed = Url::parse("svc://h//Foo").unwrap();
        let built = Url::new("svc", "h", 0, "/Foo");
        assert_eq!(parsed, built);
        assert_eq!(parsed.to_full_string(), "svc://h/Foo");
    }

    #[test]
    fn unterminated_bracket_is_rejected() {
        assert!(matches!(
            Url::parse("svc://[fe80::1/Foo"),
            Err(UrlError::InvalidHost(_))
        ));
        assert!(matches!(
            Url::parse("svc://[fe80::1]x/Foo"),
            Err(UrlError::InvalidHost(_))
        ));
    }

    #[test]
    fn encoded_values_survive_parse() {
        let url = Url::new("svc", "host", 1, "Foo").with_parameter("group", "a,b&c");
        let parsed = Url::parse(&url.to_full_string()).unwrap();
        assert_eq!(parsed.parameter("group"), Some("a,b&c"));
        assert_eq!(parsed, url);
    }
}
