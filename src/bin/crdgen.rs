//! # CRD Generator
//!
//! Prints the `Token` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/token.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::CustomResourceExt;
use token_rotation_controller::crd::Token;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Token::crd())?);
    Ok(())
}
