//! Access log
//!
//! Every API call writes one line on the `access_log` target:
//!
//! ```text
//! create-queries  NEW_QUERIES('[QueryCreation[databaseId=1,name=LOG_TEST_1]]')
//! ```
//!
//! Parameters are rendered through [`LogRepr`], which gives creations the
//! compact `Type[field=value,...]` form.

/// Compact textual form of a value in the access log
pub trait LogRepr {
    fn log_repr(&self) -> String;
}

impl<T: LogRepr> LogRepr for Vec<T> {
    fn log_repr(&self) -> String {
        self.as_slice().log_repr()
    }
}

impl<T: LogRepr> LogRepr for [T] {
    fn log_repr(&self) -> String {
        let items: Vec<String> = self.iter().map(LogRepr::log_repr).collect();
        format!("[{}]", items.join(", "))
    }
}

impl<T: LogRepr> LogRepr for Option<T> {
    fn log_repr(&self) -> String {
        match self {
            Some(value) => value.log_repr(),
            None => "null".to_string(),
        }
    }
}

impl<T: LogRepr + ?Sized> LogRepr for &T {
    fn log_repr(&self) -> String {
        (**self).log_repr()
    }
}

impl LogRepr for String {
    fn log_repr(&self) -> String {
        self.clone()
    }
}

impl LogRepr for i64 {
    fn log_repr(&self) -> String {
        self.to_string()
    }
}

/// Implement [`LogRepr`] through `Display`
#[macro_export]
macro_rules! display_log_repr {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::access_log::LogRepr for $ty {
                fn log_repr(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

/// Implement [`LogRepr`] as `Name[field=value,...]` over the listed fields
#[macro_export]
macro_rules! struct_log_repr {
    ($ty:ty, $name:literal, $($label:literal => $field:ident),+ $(,)?) => {
        impl $crate::access_log::LogRepr for $ty {
            fn log_repr(&self) -> String {
                let fields: Vec<String> = vec![
                    $( format!("{}={}", $label, $crate::access_log::LogRepr::log_repr(&self.$field)) ),+
                ];
                format!("{}[{}]", $name, fields.join(","))
            }
        }
    };
}

display_log_repr!(
    openbis_common::types::DataSetKind,
    openbis_common::types::QueryType,
    openbis_common::types::AddressType
);

/// Render a log line: the operation, two spaces, then `NAME('value')` pairs
pub fn format_line(operation: &str, params: &[(&str, String)]) -> String {
    let rendered: Vec<String> = params
        .iter()
        .map(|(name, value)| format!("{}('{}')", name, value))
        .collect();
    format!("{}  {}", operation, rendered.join(" "))
}

/// Write one access log line for `user_id`
pub fn record(user_id: &str, operation: &str, params: &[(&str, String)]) {
    let line = format_line(operation, params);
    tracing::info!(target: "access_log", user = %user_id, "{}", line);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Creation {
        database_id: String,
        name: String,
    }

    struct_log_repr!(Creation, "QueryCreation", "databaseId" => database_id, "name" => name);

    #[test]
    fn test_line_format() {
        let creations = vec![Creation {
            database_id: "1".to_string(),
            name: "LOG_TEST_1".to_string(),
        }];
        let line = format_line("create-queries", &[("NEW_QUERIES", creations.log_repr())]);
        assert_eq!(
            line,
            "create-queries  NEW_QUERIES('[QueryCreation[databaseId=1,name=LOG_TEST_1]]')"
        );
    }

    #[test]
    fn test_multiple_params() {
        let ids = vec!["SPACE_TO_DELETE".to_string()];
        let line = format_line(
            "delete-spaces",
            &[("SPACE_IDS", ids.log_repr()), ("REASON", "cleanup".to_string())],
        );
        assert_eq!(line, "delete-spaces  SPACE_IDS('[SPACE_TO_DELETE]') REASON('cleanup')");
    }
}
