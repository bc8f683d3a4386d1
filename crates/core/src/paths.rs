//! Store path builders for the persisted layout.
//!
//! ```text
//! patients/{patient_id}
//! patients/{patient_id}/procedures/{procedure_id}
//! patients/{patient_id}/procedures/{procedure_id}/surgery/current
//! patients/{patient_id}/procedures/{procedure_id}/pre_anaesthetic/current
//! patients/{patient_id}/procedures/{procedure_id}/pacu/current
//! ```
//!
//! All collection names are compile-time constants that satisfy segment
//! validation, so the builders below cannot fail at runtime.

use crate::constants::{
    PACU_COLLECTION, PATIENTS_COLLECTION, PRE_ANAESTHETIC_COLLECTION, PROCEDURES_COLLECTION,
    SINGLETON_DOC_ID, SURGERY_COLLECTION,
};
use apr_store::{CollectionPath, DocumentPath};
use apr_types::RecordId;

/// The top-level patients collection.
pub fn patients() -> CollectionPath {
    // Constant names are valid segments by construction.
    CollectionPath::root(PATIENTS_COLLECTION).expect("constant collection name is valid")
}

/// One patient's root document.
pub fn patient_doc(patient: &RecordId) -> DocumentPath {
    patients().doc(patient)
}

/// One patient's procedures collection.
pub fn procedures(patient: &RecordId) -> CollectionPath {
    patient_doc(patient)
        .collection(PROCEDURES_COLLECTION)
        .expect("constant collection name is valid")
}

/// One procedure's root document.
pub fn procedure_doc(patient: &RecordId, procedure: &RecordId) -> DocumentPath {
    procedures(patient).doc(procedure)
}

/// The surgery-record singleton sub-collection of a procedure.
pub fn surgery_collection(patient: &RecordId, procedure: &RecordId) -> CollectionPath {
    procedure_doc(patient, procedure)
        .collection(SURGERY_COLLECTION)
        .expect("constant collection name is valid")
}

/// The pre-anaesthetic singleton sub-collection of a procedure.
pub fn pre_anaesthetic_collection(patient: &RecordId, procedure: &RecordId) -> CollectionPath {
    procedure_doc(patient, procedure)
        .collection(PRE_ANAESTHETIC_COLLECTION)
        .expect("constant collection name is valid")
}

/// The PACU singleton sub-collection of a procedure.
pub fn pacu_collection(patient: &RecordId, procedure: &RecordId) -> CollectionPath {
    procedure_doc(patient, procedure)
        .collection(PACU_COLLECTION)
        .expect("constant collection name is valid")
}

/// The well-known document written inside a singleton sub-collection.
pub fn singleton_doc(collection: &CollectionPath) -> DocumentPath {
    let id = RecordId::new(SINGLETON_DOC_ID).expect("constant document id is valid");
    collection.doc(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RecordId {
        RecordId::new(s).expect("valid id")
    }

    #[test]
    fn builds_the_documented_layout() {
        let patient = id("p1");
        let procedure = id("proc1");

        assert_eq!(patient_doc(&patient).key(), "patients/p1");
        assert_eq!(
            procedure_doc(&patient, &procedure).key(),
            "patients/p1/procedures/proc1"
        );
        assert_eq!(
            singleton_doc(&surgery_collection(&patient, &procedure)).key(),
            "patients/p1/procedures/proc1/surgery/current"
        );
        assert_eq!(
            singleton_doc(&pre_anaesthetic_collection(&patient, &procedure)).key(),
            "patients/p1/procedures/proc1/pre_anaesthetic/current"
        );
        assert_eq!(
            singleton_doc(&pacu_collection(&patient, &procedure)).key(),
            "patients/p1/procedures/proc1/pacu/current"
        );
    }
}
