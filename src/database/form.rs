use std::str::FromStr;

use super::error::{ApiError, FieldErrors};

/// Decoded query string. Keeps every pair in order so repeated keys survive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryForm {
    inner: Vec<(String, String)>,
}

impl QueryForm {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { inner: pairs }
    }

    pub fn parse(raw: &str) -> Self {
        Self {
            inner: url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.inner
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) if !value.is_empty() => value
                .parse()
                .map(Some)
                .map_err(|_e| ApiError::Validation(FieldErrors::single(key, "Enter a number."))),
            _ => Ok(None),
        }
    }

    /// Boolean filter value; `1` and `true` switch the filter on.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(
            self.get_str(key).map(|v| v.to_ascii_lowercase()).as_deref(),
            Some("1") | Some("true")
        )
    }

    /// Re-encodes the pairs, replacing `key` with `value` (or dropping it on `None`).
    pub fn with_param(&self, key: &str, value: Option<&str>) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        let mut replaced = false;

        for (k, v) in self.inner.iter() {
            if k != key {
                serializer.append_pair(k, v);
            } else if !replaced {
                replaced = true;
                if let Some(value) = value {
                    serializer.append_pair(key, value);
                }
            }
        }
        if !replaced {
            if let Some(value) = value {
                serializer.append_pair(key, value);
            }
        }

        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_kept() {
        let form = QueryForm::parse("tags=breakfast&tags=lunch&author=3&tags=");
        assert_eq!(form.get_list("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_str("author"), Some("3"));
    }

    #[test]
    fn numbers_parse_or_fail() {
        let form = QueryForm::parse("page=2&limit=abc");
        assert_eq!(form.get_number::<i64>("page").unwrap(), Some(2));
        assert_eq!(form.get_number::<i64>("missing").unwrap(), None);
        assert!(form.get_number::<i64>("limit").is_err());
    }

    #[test]
    fn flags_accept_one_and_true() {
        let form = QueryForm::parse("is_favorited=1&is_in_shopping_cart=TRUE&other=0");
        assert!(form.get_flag("is_favorited"));
        assert!(form.get_flag("is_in_shopping_cart"));
        assert!(!form.get_flag("other"));
        assert!(!form.get_flag("missing"));
    }

    #[test]
    fn with_param_replaces_in_place() {
        let form = QueryForm::parse("page=2&tags=a%20b&limit=6");
        assert_eq!(form.with_param("page", Some("3")), "page=3&tags=a+b&limit=6");
        assert_eq!(form.with_param("page", None), "tags=a+b&limit=6");
        assert_eq!(
            QueryForm::parse("limit=6").with_param("page", Some("2")),
            "limit=6&page=2"
        );
    }
}
