//! Physical quantities used throughout the workspace.
//!
//! Quantities are `uom` types stored as `f32`. Making values from float
//! literals is very long-winded in `uom`, so pithily-named constructors
//! (`mm(3.0)`, `s(1.5)`) and extractors (`mm_(length)`, `s_(time)`) are
//! provided.

pub mod todo;

pub use uom;
pub use float_eq;
pub use uom::si::Quantity;
pub use uom::si::f32::{Length, Time, Ratio};

mod units {
  pub use uom::si::{length  ::{nanometer, millimeter, centimeter},
                    time    ::{second, nanosecond, picosecond},
                    ratio   ::ratio,
  };
}

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f32) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(cm     Length         centimeter);
wrap!(mm     Length         millimeter);
wrap!(nm     Length          nanometer);
wrap!(s      Time               second);
wrap!(ns     Time           nanosecond);
wrap!(ps     Time           picosecond);
wrap!(ratio  Ratio               ratio);

// Reverse direction of the above.
pub fn mm_(x: Length) -> f32 { x.get::<units::millimeter>() }
pub fn cm_(x: Length) -> f32 { x.get::<units::centimeter>() }
pub fn s_ (x: Time  ) -> f32 { x.get::<units::second>    () }
pub fn ps_(x: Time  ) -> f32 { x.get::<units::picosecond>() }
pub fn ns_(x: Time  ) -> f32 { x.get::<units::nanosecond>() }

pub fn ratio_(x: Ratio) -> f32 { x.get::<units::ratio>() }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    $crate::float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}
