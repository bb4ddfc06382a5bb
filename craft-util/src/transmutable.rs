/// Bit-reinterpret between same-width integer/float representations, for the
/// framed buffer's IEEE-754 float codec: floats travel the wire as their
/// exact big-endian bit pattern, never through a lossy numeric conversion.
pub trait Transmutable<T> {
    fn transmute(self) -> T;
}

macro_rules! primitive_int_int_transmutable {
    ($a:ty, $b:ty) => {
        impl Transmutable<$b> for $a {
            fn transmute(self) -> $b {
                unsafe { std::mem::transmute::<$a, $b>(self) }
            }
        }

        impl Transmutable<$a> for $b {
            fn transmute(self) -> $a {
                unsafe { std::mem::transmute::<$b, $a>(self) }
            }
        }
    };
}

macro_rules! primitive_int_float_transmutable {
    ($int:ty, $int_uint:ty, $float:ty) => {
        impl Transmutable<$float> for $int {
            fn transmute(self) -> $float {
                #[allow(clippy::useless_transmute)]
                <$float>::from_bits(unsafe { std::mem::transmute::<$int, $int_uint>(self) })
            }
        }

        impl Transmutable<$int> for $float {
            fn transmute(self) -> $int {
                #[allow(clippy::useless_transmute)]
                unsafe {
                    std::mem::transmute::<$int_uint, $int>(self.to_bits())
                }
            }
        }
    };
}

primitive_int_int_transmutable!(u8, i8);
primitive_int_int_transmutable!(u16, i16);
primitive_int_int_transmutable!(u32, i32);
primitive_int_float_transmutable!(u32, u32, f32);
primitive_int_float_transmutable!(i32, u32, f32);
primitive_int_int_transmutable!(u64, i64);
primitive_int_float_transmutable!(u64, u64, f64);
primitive_int_float_transmutable!(i64, u64, f64);

#[cfg(test)]
mod test {
    use super::Transmutable;

    #[test]
    fn float_bit_roundtrip() {
        let v: f64 = -1234.5678;
        let bits: u64 = v.transmute();
        let back: f64 = bits.transmute();
        assert_eq!(v, back);
    }
}
