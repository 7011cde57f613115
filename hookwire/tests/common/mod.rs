#![allow(dead_code)]

use hookwire::GeneratorConfig;

/// Every combination of the generator's optional passes that keeps bare-name
/// aliases on.
pub fn configs() -> [GeneratorConfig; 2] {
    [
        GeneratorConfig::new(),
        GeneratorConfig::new().collapse_single_paths(false),
    ]
}
