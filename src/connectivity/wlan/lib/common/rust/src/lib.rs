// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Crate wlan-common hosts the IEEE 802.11 frame and element definitions used by the WLAN
//! management stack, together with small helpers for signal accounting and time units.

pub mod buffer_reader;
pub mod energy;
pub mod error;
pub mod ewma_signal;
pub mod ie;
pub mod mac;
pub mod test_utils;
pub mod time;

pub use time::TimeUnit;

/// Asserts that the given expression matches one of the listed patterns. The optional `=>` arm
/// runs with the bindings of the matched pattern.
#[macro_export]
macro_rules! assert_variant {
    ($test:expr, $variant:pat => $e:expr $(,)?) => {
        match $test {
            $variant => $e,
            other => panic!("unexpected variant: {:?}", other),
        }
    };
    ($test:expr, $variant:pat $(,)?) => {
        $crate::assert_variant!($test, $variant => {})
    };
}

#[cfg(test)]
mod tests {
    #[derive(Debug)]
    enum Foo {
        A(u8),
        B,
    }

    #[test]
    fn assert_variant_binds_value() {
        let value = assert_variant!(Foo::A(5), Foo::A(v) => v);
        assert_eq!(value, 5);
        assert_variant!(Foo::B, Foo::B);
    }

    #[test]
    #[should_panic(expected = "unexpected variant")]
    fn assert_variant_panics_on_mismatch() {
        assert_variant!(Foo::B, Foo::A(_));
    }
}
