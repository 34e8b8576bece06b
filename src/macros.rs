/// Use this macro to register a record type as a report written to its own CSV file.
#[macro_export]
macro_rules! define_report {
    ($name:ident, $file_stem:expr) => {
        impl $crate::report::Report for $name {
            fn file_stem() -> &'static str {
                $file_stem
            }
        }
    };
}
pub use define_report;

#[macro_export]
macro_rules! assert_almost_eq {
    ($a:expr, $b:expr, $prec:expr $(,)?) => {
        if !$crate::numeric::almost_eq($a, $b, $prec) {
            panic!(
                "assertion failed: `abs(left - right) < {:e}`, (left: `{}`, right: `{}`)",
                $prec, $a, $b
            );
        }
    };
}
pub use assert_almost_eq;
