use std::env;
use std::f64::consts::PI;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

fn write_twiddle_table() {
    const DEPTH: usize = 10;

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("twiddle_table.rs");
    let mut file = File::create(dest_path).unwrap();

    writeln!(file, "pub(crate) const TWIDDLE_DEPTH: usize = {};", DEPTH)
        .unwrap();
    write!(
        file,
        "pub(crate) const TWIDDLE: [(f32, f32); 1 << (TWIDDLE_DEPTH - 1)] = ["
    )
    .unwrap();

    // Only the first half turn is needed: a length `L` butterfly stage uses
    // `exp(-2 pi i k / L)` for `k < L/2`, which is every `(1 << DEPTH) / L`-th
    // entry of this table.
    for i in 0..(1 << (DEPTH - 1)) {
        if i % 2 == 0 {
            write!(file, "\n   ").unwrap();
        }
        let (sin, cos) =
            (-2. * PI * i as f64 / (1 << DEPTH) as f64).sin_cos();
        write!(file, " ({:?}, {:?}),", cos as f32, sin as f32).unwrap();
    }
    writeln!(file, "\n];").unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}

fn main() {
    write_twiddle_table();
}
