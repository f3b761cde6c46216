mod custom_script;
mod transfer_ckb;

pub use custom_script::{CapacityDiffScriptHandler, CapacityDiffScriptSigner, CustomScript};
pub use transfer_ckb::TransferCkb;

use ckb_sdk_examples_env::script::secp256k1::{Secp256k1Handler, Secp256k1Signer};
use ckb_sdk_examples_env::script::ScriptRegistry;
use ckb_sdk_examples_env::{Env, Result};

/// An example that builds and sends transactions on the shared dev chain.
///
/// Examples run in sequence against the same node, so each one must only
/// depend on cells it creates itself or on the miner's balance.
pub trait Example {
    fn name(&self) -> &'static str;

    fn run(&self, env: &Env) -> Result<()>;
}

pub fn all_examples() -> Vec<Box<dyn Example>> {
    vec![Box::new(TransferCkb), Box::new(CustomScript)]
}

/// A registry that can build and sign for the miner's secp256k1 lock.
pub fn miner_registry(env: &Env) -> Result<ScriptRegistry> {
    let dev_chain = env.dev_chain();
    let mut registry = ScriptRegistry::new();
    registry.register(
        dev_chain.secp256k1_code_hash()?,
        Secp256k1Handler::new(dev_chain.secp256k1_cell_dep()?),
        Secp256k1Signer::new(vec![env.miner_key()?])?,
    );
    Ok(registry)
}
