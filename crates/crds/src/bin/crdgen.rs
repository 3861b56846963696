//! Prints the CRDs served by the operator as a multi-document YAML stream.

use crds::Deployment;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("---\n{}", serde_yaml::to_string(&Deployment::crd())?);
    Ok(())
}
