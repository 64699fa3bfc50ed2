//! Native console program that calls the managed exports
//!
//! The exports are linked by their C names, the same way any native program
//! would link against the exports library. No bridge code runs here.

use clap::Parser;
use interop_exports as _;

extern "C" {
    fn rng_crypto_int_32() -> i32;
    fn rng_crypto_int_64() -> i64;
}

/// Call the managed random exports and print the results
#[derive(Parser)]
#[command(name = "interop-probe")]
#[command(version)]
struct Args {
    /// Exit with this code after printing
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    exit_code: i32,
}

fn main() {
    let args = Args::parse();

    println!("Native console start");

    // Safety: both exports take no arguments and return a fixed-width integer
    let (int32, int64) = unsafe { (rng_crypto_int_32(), rng_crypto_int_64()) };
    println!("Crypto Random Int32: {}", int32);
    println!("Crypto Random Int64: {}", int64);

    println!("Native console finish");
    std::process::exit(args.exit_code);
}
