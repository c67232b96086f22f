//! Dense integer identifiers used throughout the task model and preprocessor.

sas_collections::create_ref_type!(VarId);
sas_collections::create_ref_type!(OpId);
sas_collections::create_ref_type!(AxiomId);

/// A value taken by a finite-domain variable. Always `< domain_size` of its variable.
pub type Value = u32;
