mod dense;
mod failures;
mod propagators;
