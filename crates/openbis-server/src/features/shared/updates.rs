//! Update descriptors for to-many relations

use serde::{Deserialize, Deserializer, Serialize};

/// Changes to a list relation.
///
/// `set` replaces the whole list; `add` and `remove` are applied on top.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListUpdate<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<T>>,
    pub add: Vec<T>,
    pub remove: Vec<T>,
}

impl<T> Default for ListUpdate<T> {
    fn default() -> Self {
        Self {
            set: None,
            add: Vec::new(),
            remove: Vec::new(),
        }
    }
}

impl<T> ListUpdate<T> {
    pub fn is_empty(&self) -> bool {
        self.set.is_none() && self.add.is_empty() && self.remove.is_empty()
    }

    pub fn adding(items: Vec<T>) -> Self {
        Self {
            add: items,
            ..Self::default()
        }
    }

    pub fn removing(items: Vec<T>) -> Self {
        Self {
            remove: items,
            ..Self::default()
        }
    }
}

/// Deserializer for `Option<Option<T>>` fields: absent stays `None`,
/// an explicit `null` becomes `Some(None)`.
///
/// ```rust,ignore
/// #[serde(default, deserialize_with = "present")]
/// pub experiment_id: Option<Option<EntityRef>>,
/// ```
pub fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Links to create and drop, derived from the current link set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub add: Vec<i64>,
    pub remove: Vec<i64>,
}

/// Compute the link changes for resolved ids
pub fn plan_links(current: &[i64], set: Option<&[i64]>, add: &[i64], remove: &[i64]) -> LinkPlan {
    let mut target: Vec<i64> = match set {
        Some(ids) => ids.to_vec(),
        None => current.to_vec(),
    };
    for id in add {
        if !target.contains(id) {
            target.push(*id);
        }
    }
    target.retain(|id| !remove.contains(id));

    LinkPlan {
        add: target.iter().filter(|id| !current.contains(id)).copied().collect(),
        remove: current.iter().filter(|id| !target.contains(id)).copied().collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let plan = plan_links(&[1, 2], None, &[3, 2], &[1]);
        assert_eq!(plan.add, vec![3]);
        assert_eq!(plan.remove, vec![1]);
    }

    #[test]
    fn test_set_replaces() {
        let plan = plan_links(&[1, 2], Some(&[2, 4]), &[], &[]);
        assert_eq!(plan.add, vec![4]);
        assert_eq!(plan.remove, vec![1]);
    }

    #[derive(Debug, Deserialize)]
    struct Nullable {
        #[serde(default, deserialize_with = "present")]
        value: Option<Option<String>>,
    }

    #[test]
    fn test_present_tells_null_from_absent() {
        let absent: Nullable = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.value, None);
        let null: Nullable = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(null.value, Some(None));
        let set: Nullable = serde_json::from_str(r#"{"value": "X"}"#).unwrap();
        assert_eq!(set.value, Some(Some("X".to_string())));
    }

    #[test]
    fn test_empty_update_is_noop() {
        assert_eq!(plan_links(&[1], None, &[], &[]), LinkPlan::default());
        assert!(ListUpdate::<String>::default().is_empty());
    }
}
