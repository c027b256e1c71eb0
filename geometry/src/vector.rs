use std::ops::{Add, Index, Mul, Neg, Sub};
use units::{Length, mm, mm_};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector {
    pub x: Length,
    pub y: Length,
    pub z: Length,
}

impl Mul<f32> for Vector {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self::Output {
        Vector {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Vector { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl Sub for Vector {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Vector { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl Neg for Vector {
    type Output = Self;
    fn neg(self) -> Self::Output { self * -1.0 }
}

impl Index<usize> for Vector {
    type Output = Length;
    fn index(&self, index: usize) -> &Self::Output {
        match index {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("index {index} is out of bounds [0,2]")
        }
    }
}

impl Vector {

    pub fn new(x: Length, y: Length, z: Length) -> Self { Self { x, y, z } }

    /// Construct from `f32`s which are interpreted as lengths in `mm`
    pub fn from_mm(x: f32, y: f32, z: f32) -> Self { Self::new(mm(x), mm(y), mm(z)) }

    /// Components as `f32`s in `mm`
    pub fn to_mm(self) -> [f32; 3] { [mm_(self.x), mm_(self.y), mm_(self.z)] }

    pub fn zero() -> Self { Self::from_mm(0.0, 0.0, 0.0) }

    pub fn magnitude(&self) -> Length {
        let [x, y, z] = self.to_mm();
        mm((x*x + y*y + z*z).sqrt())
    }

}
