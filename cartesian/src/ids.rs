//! Dense integer identifiers for the Cartesian abstraction core.

sas_collections::create_ref_type!(AbstractStateId);
sas_collections::create_ref_type!(NodeId);
