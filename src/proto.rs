//! Generated types for the Secrets Store CSI driver provider API.

#[allow(clippy::all, missing_docs)]
pub mod v1alpha1 {
    tonic::include_proto!("v1alpha1");
}
