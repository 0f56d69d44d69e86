//! Sub-state-machine for parameters whose apply requires more than a
//! plain replace (spec section 4.4): refresh observes the live value,
//! and add/modify/remove drive whatever external effect the parameter
//! owns. Implementations that need to run a command reach the bound
//! execution channel via `codify_exec::current_channel()` rather than
//! through an explicit argument here.

use async_trait::async_trait;

use crate::error::ControllerError;
use crate::value::Value;

#[async_trait]
pub trait StatefulParameter: Send + Sync {
    /// Read the current value of this parameter from the live resource.
    /// `None` means the parameter is currently absent.
    async fn refresh(&self, desired: Option<&Value>) -> Result<Option<Value>, ControllerError>;

    async fn apply_add(&self, value: &Value) -> Result<(), ControllerError>;

    async fn apply_remove(&self, value: &Value) -> Result<(), ControllerError>;

    /// Default: array-valued parameters are diffed element-by-element
    /// (honoring `allow_deletes`); anything else is a remove-then-add.
    /// `stateful_mode` is the plan's own mode, not a property of this
    /// parameter — the same `StatefulParameter` can be driven in either
    /// mode across different requests.
    async fn apply_modify(
        &self,
        new_value: &Value,
        previous_value: &Value,
        stateful_mode: bool,
    ) -> Result<(), ControllerError> {
        match (previous_value, new_value) {
            (Value::Array(prev_items), Value::Array(new_items)) => {
                self.apply_array_modify(prev_items, new_items, stateful_mode).await
            }
            _ => {
                self.apply_remove(previous_value).await?;
                self.apply_add(new_value).await
            }
        }
    }

    /// Element equality used by the default array diff. Defaults to
    /// structural equality; override to match a custom `isElementEqual`.
    fn is_element_equal(&self, a: &Value, b: &Value) -> bool {
        a == b
    }

    async fn apply_add_item(&self, item: &Value) -> Result<(), ControllerError> {
        self.apply_add(item).await
    }

    async fn apply_remove_item(&self, item: &Value) -> Result<(), ControllerError> {
        self.apply_remove(item).await
    }

    /// `false` suppresses `apply_remove_item` in the default array diff.
    /// Spec section 4.4: stateless mode (`stateful_mode == false`)
    /// suppresses removals (`allowDeletes = false`); stateful mode allows
    /// them. Override only to depart from that per-mode default.
    fn allow_deletes(&self, stateful_mode: bool) -> bool {
        stateful_mode
    }

    async fn apply_array_modify(
        &self,
        previous_items: &[Value],
        new_items: &[Value],
        stateful_mode: bool,
    ) -> Result<(), ControllerError> {
        let to_add: Vec<&Value> = new_items
            .iter()
            .filter(|n| !previous_items.iter().any(|p| self.is_element_equal(n, p)))
            .collect();
        let to_remove: Vec<&Value> = previous_items
            .iter()
            .filter(|p| !new_items.iter().any(|n| self.is_element_equal(n, p)))
            .collect();

        if self.allow_deletes(stateful_mode) {
            for item in &to_remove {
                self.apply_remove_item(item).await?;
            }
        }
        for item in &to_add {
            self.apply_add_item(item).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingParameter {
        added: Mutex<Vec<Value>>,
        removed: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl StatefulParameter for RecordingParameter {
        async fn refresh(&self, _desired: Option<&Value>) -> Result<Option<Value>, ControllerError> {
            Ok(None)
        }

        async fn apply_add(&self, value: &Value) -> Result<(), ControllerError> {
            self.added.lock().unwrap().push(value.clone());
            Ok(())
        }

        async fn apply_remove(&self, value: &Value) -> Result<(), ControllerError> {
            self.removed.lock().unwrap().push(value.clone());
            Ok(())
        }
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[tokio::test]
    async fn default_apply_modify_is_remove_then_add_for_scalars() {
        let param = RecordingParameter::default();
        param.apply_modify(&s("new"), &s("old"), true).await.unwrap();
        assert_eq!(*param.removed.lock().unwrap(), vec![s("old")]);
        assert_eq!(*param.added.lock().unwrap(), vec![s("new")]);
    }

    #[tokio::test]
    async fn default_array_modify_only_touches_the_delta() {
        let param = RecordingParameter::default();
        let previous = Value::Array(vec![s("a"), s("b"), s("c")]);
        let new = Value::Array(vec![s("b"), s("c"), s("d")]);
        param.apply_modify(&new, &previous, true).await.unwrap();
        assert_eq!(*param.removed.lock().unwrap(), vec![s("a")]);
        assert_eq!(*param.added.lock().unwrap(), vec![s("d")]);
    }

    #[tokio::test]
    async fn stateless_mode_suppresses_removals_in_the_default_array_diff() {
        let param = RecordingParameter::default();
        let previous = Value::Array(vec![s("a"), s("b")]);
        let new = Value::Array(vec![s("b"), s("c")]);
        param.apply_modify(&new, &previous, false).await.unwrap();
        assert!(param.removed.lock().unwrap().is_empty());
        assert_eq!(*param.added.lock().unwrap(), vec![s("c")]);
    }

    struct AlwaysDeleteParameter(RecordingParameter);

    #[async_trait]
    impl StatefulParameter for AlwaysDeleteParameter {
        async fn refresh(&self, desired: Option<&Value>) -> Result<Option<Value>, ControllerError> {
            self.0.refresh(desired).await
        }
        async fn apply_add(&self, value: &Value) -> Result<(), ControllerError> {
            self.0.apply_add(value).await
        }
        async fn apply_remove(&self, value: &Value) -> Result<(), ControllerError> {
            self.0.apply_remove(value).await
        }
        fn allow_deletes(&self, _stateful_mode: bool) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn overridden_allow_deletes_ignores_the_mode() {
        let param = AlwaysDeleteParameter(RecordingParameter::default());
        let previous = Value::Array(vec![s("a"), s("b")]);
        let new = Value::Array(vec![s("b"), s("c")]);
        param.apply_modify(&new, &previous, false).await.unwrap();
        assert_eq!(*param.0.removed.lock().unwrap(), vec![s("a")]);
        assert_eq!(*param.0.added.lock().unwrap(), vec![s("c")]);
    }
}
