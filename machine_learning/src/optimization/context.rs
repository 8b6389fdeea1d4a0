use std::num::NonZeroUsize;

/// What every update rule gets to know about the current step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// The global iteration counter, starting at 1 and shared by every tensor within a step.
    pub iter: NonZeroUsize,
    /// The learning rate, which is also the radius of the L1 feasible region.
    pub lr: f32,
}

impl StepContext {
    pub fn new(iter: NonZeroUsize, lr: f32) -> Self {
        Self { iter, lr }
    }

    /// Returns the context of the very first step.
    pub fn first(lr: f32) -> Self {
        Self::new(NonZeroUsize::MIN, lr)
    }

    /// Whether no history has been recorded yet.
    pub fn is_first_step(&self) -> bool {
        self.iter == NonZeroUsize::MIN
    }

    pub fn iter(&self) -> usize {
        self.iter.get()
    }

    /// Returns the context of the following step.
    pub fn next(self) -> Self {
        Self {
            iter: self.iter.saturating_add(1),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_count_from_one() {
        let ctx = StepContext::first(0.1);
        assert!(ctx.is_first_step());
        assert_eq!(ctx.iter(), 1);

        let ctx = ctx.next();
        assert!(!ctx.is_first_step());
        assert_eq!(ctx.iter(), 2);
        assert_eq!(ctx.lr, 0.1);
    }
}
