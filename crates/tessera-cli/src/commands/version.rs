//! Version command implementation.

use crate::style::SemanticStyle;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("{} {}", "tessera".header(), VERSION);
    println!();
    println!("{}", "Attribute-based access control decision point.".muted());
    println!();
    println!("Build info:");
    println!("  Engine:  tessera-abac {VERSION}");
    println!("  Target:  {}", std::env::consts::ARCH);
    println!("  OS:      {}", std::env::consts::OS);
}
