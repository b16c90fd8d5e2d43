//! Folding a phase's successful results into one value
//!
//! The collector calls `empty` once per phase and `fold` once per
//! successful result, in submission order. Failed tasks are reported
//! separately and never reach `fold`.

use std::fmt;
use std::ops::Add;

/// Per-phase aggregation strategy
pub trait Aggregate<T>: Send + Sync + 'static {
    /// Aggregate value published in each `PhaseReport`
    type Output: Send + 'static;

    /// Starting value of a phase
    fn empty(&self) -> Self::Output;

    /// Combine the running value with one result
    fn fold(&self, acc: Self::Output, value: T) -> Self::Output;
}

/// Sum of all successful results (`T::default()` for an empty phase)
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<T> Aggregate<T> for Sum
where
    T: Add<Output = T> + Default + Send + 'static,
{
    type Output = T;

    fn empty(&self) -> T {
        T::default()
    }

    fn fold(&self, acc: T, value: T) -> T {
        acc + value
    }
}

/// Every successful result, in submission order
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect;

impl<T: Send + 'static> Aggregate<T> for Collect {
    type Output = Vec<T>;

    fn empty(&self) -> Vec<T> {
        Vec::new()
    }

    fn fold(&self, mut acc: Vec<T>, value: T) -> Vec<T> {
        acc.push(value);
        acc
    }
}

/// Closure-based fold with a cloneable initial value
///
/// ```ignore
/// let max = Fold::new(i64::MIN, |acc: i64, v: i64| acc.max(v));
/// ```
pub struct Fold<A, F> {
    init: A,
    f: F,
}

impl<A, F> Fold<A, F> {
    pub fn new(init: A, f: F) -> Self {
        Self { init, f }
    }
}

impl<T, A, F> Aggregate<T> for Fold<A, F>
where
    A: Clone + Send + Sync + 'static,
    F: Fn(A, T) -> A + Send + Sync + 'static,
{
    type Output = A;

    fn empty(&self) -> A {
        self.init.clone()
    }

    fn fold(&self, acc: A, value: T) -> A {
        (self.f)(acc, value)
    }
}

impl<A: fmt::Debug, F> fmt::Debug for Fold<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fold").field("init", &self.init).finish()
    }
}
