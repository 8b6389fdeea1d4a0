use crate::{MlErr, Result, tensor::Tensor};

/// The latest value observed for each tensor of the parameter list. Older values are never read,
/// so each tensor keeps a single slot.
#[derive(Debug, Clone)]
pub struct History {
    what: &'static str,
    slots: Vec<Option<Tensor>>,
}

impl History {
    /// Creates an empty `History`.
    ///
    /// # Arguments
    /// * `what` - What is being recorded, used for error messages.
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            slots: Vec::new(),
        }
    }

    /// Overwrites the slot of `layer` with `value`.
    pub fn record(&mut self, layer: usize, value: Tensor) {
        if layer >= self.slots.len() {
            self.slots.resize(layer + 1, None);
        }

        self.slots[layer] = Some(value);
    }

    /// Returns the latest value recorded for `layer`.
    ///
    /// # Arguments
    /// * `layer` - The position of the tensor.
    /// * `iter` - The iteration asking for it, used for error messages.
    ///
    /// # Returns
    /// A `MissingHistory` error if nothing was recorded for `layer` yet.
    pub fn last(&self, layer: usize, iter: usize) -> Result<&Tensor> {
        self.slots
            .get(layer)
            .and_then(Option::as_ref)
            .ok_or(MlErr::MissingHistory {
                what: self.what,
                layer,
                iter,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn keeps_only_the_latest_value() {
        let mut history = History::new("gradient");
        assert!(history.is_empty());

        history.record(1, arr1(&[1.0]).into_dyn());
        history.record(1, arr1(&[2.0]).into_dyn());

        assert_eq!(history.last(1, 3).unwrap(), &arr1(&[2.0]).into_dyn());
        assert!(matches!(
            history.last(0, 3),
            Err(MlErr::MissingHistory { layer: 0, iter: 3, .. })
        ));
        assert!(history.last(5, 3).is_err());
    }
}
