// src/demo.rs

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// (file name, contents) of the bundled sample receipts.
const SAMPLE_RECEIPTS: [(&str, &str); 4] = [
    (
        "starbucks_01.txt",
        "STARBUCKS COFFEE
Store #1234
123 Main Street, Seattle WA

Date: 2024-01-15  Time: 08:30
Order: 1234567890

Grande Pike Place Roast    $2.85
Venti Caramel Macchiato    $5.95
Chocolate Croissant        $3.25
Cookie                     $2.50

Subtotal:                 $14.55
Tax:                       $1.31
TOTAL:                    $15.86

Thank you for visiting Starbucks!",
    ),
    (
        "walmart_receipt.txt",
        "WAL-MART SUPERCENTER
1950 Walmart Way, Bentonville AR

Date: 01/15/2024  Time: 14:22
Transaction ID: 7890123456

Great Value Milk 1Gal      $3.48
Wonder Bread Classic       $1.98
Bananas 2.1 lbs @ $0.68    $1.43
Chicken Breast 1.5lbs      $7.47
Orange Juice 64oz          $3.98

SUBTOTAL:                 $18.34
TAX:                       $1.47
TOTAL:                    $19.81

Items: 5  Thank you!",
    ),
    (
        "mcdonalds_receipt.txt",
        "McDonald's Restaurant
Golden Arches Location
456 Fast Food Blvd

Order #789 - Drive Thru
01/15/2024  12:15 PM

Big Mac Meal Large         $9.99
Apple Pie                  $1.29
Small McCafe Coffee        $1.99
Extra Sauce                $0.50

Subtotal:                 $13.77
Tax:                       $1.10
TOTAL:                    $14.87

Thank you for choosing McDonald's!",
    ),
    (
        "starbucks_02.txt",
        "STARBUCKS COFFEE
Airport Location
Terminal B, Gate 15

Date: 01/16/2024  Time: 06:45
Order: 2345678901

Venti Pike Place           $2.95
Breakfast Sandwich         $5.45
Bottled Water              $2.25

Subtotal:                 $10.65
Tax:                       $0.96
TOTAL:                    $11.61

Safe travels!",
    ),
];

/// Write the sample receipts into `dir`, creating it if needed.
/// Existing files with the same names are overwritten.
pub fn write_sample_receipts(dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(SAMPLE_RECEIPTS.len());
    for (name, content) in SAMPLE_RECEIPTS {
        let path = dir.join(name);
        fs::write(&path, content)?;
        info!(file = %name, "Wrote sample receipt");
        written.push(path);
    }
    Ok(written)
}
