//! Black-box tests of the pending transactions tracker live in `tests/`.
