// Resolves a module reference (`scheme:name`) into a running compute module.

use crate::compute::ComputeModule;
use crate::compute::life::GameOfLife;
use crate::compute::noise::Noise;
use crate::compute::snake::Snake;
use crate::error::{Error, Result};
use crate::types::ComputeParams;

pub const BUILTIN_SCHEME: &str = "builtin";

/// Names served under `builtin:`.
pub const BUILTIN_MODULES: [&str; 3] = ["game_of_life", "snake", "noise"];

pub fn builtin_reference(name: &str) -> String {
    format!("{BUILTIN_SCHEME}:{name}")
}

/// Instantiate the module named by `params.module_reference`.
/// Every failure carries the params that caused it.
pub fn load(params: &ComputeParams) -> Result<Box<dyn ComputeModule>> {
    let fail = |reason: String| Error::ModuleLoadFailed { params: params.clone(), reason };

    if params.size().is_empty() {
        return Err(fail("canvas has zero area".into()));
    }

    let Some((scheme, name)) = params.module_reference.split_once(':') else {
        return Err(fail(format!("reference `{}` has no scheme", params.module_reference)));
    };

    match scheme {
        BUILTIN_SCHEME => match name {
            "game_of_life" => Ok(Box::new(GameOfLife::new())),
            "snake" => Ok(Box::new(Snake::new())),
            "noise" => Ok(Box::new(Noise::new())),
            other => Err(fail(format!("no builtin module named `{other}`"))),
        },
        other => Err(fail(format!("unsupported module scheme `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_every_builtin() {
        for name in BUILTIN_MODULES {
            let params = ComputeParams::new(builtin_reference(name), 40, 40);
            let module = load(&params).unwrap();
            assert_eq!(module.name(), name);
        }
    }

    #[test]
    fn failures_embed_params() {
        let params = ComputeParams::new("https://example.invalid/x.wasm", 10, 10);
        match load(&params) {
            Err(Error::ModuleLoadFailed { params: p, reason }) => {
                assert_eq!(p, params);
                assert!(reason.contains("https"));
            }
            _ => panic!("expected ModuleLoadFailed"),
        }
        assert!(load(&ComputeParams::new("builtin:tetris", 10, 10)).is_err());
        assert!(load(&ComputeParams::new("snake", 10, 10)).is_err());
        assert!(load(&ComputeParams::new("builtin:snake", 0, 10)).is_err());
    }
}
