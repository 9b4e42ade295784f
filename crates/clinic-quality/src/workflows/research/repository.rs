use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use super::domain::{ParticipantId, ResearchStudy, StudyId, StudyParticipant};
use crate::workflows::store::RepositoryError;

/// Study row and participant as they stand after a participant write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyWrite {
    pub study: ResearchStudy,
    pub participant: StudyParticipant,
}

/// Store boundary for studies and their participants.
///
/// Participant writes carry the study version the caller read. Implementations must reject a
/// stale version with [`RepositoryError::Conflict`], then recount `current_enrollment` from
/// enrolled participants and bump the version in the same atomic step.
pub trait StudyRepository: Send + Sync {
    fn get_study(&self, id: &StudyId) -> Result<Option<ResearchStudy>, RepositoryError>;
    fn list_participants(
        &self,
        study_id: &StudyId,
    ) -> Result<Vec<StudyParticipant>, RepositoryError>;
    fn get_participant(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
    ) -> Result<Option<StudyParticipant>, RepositoryError>;
    fn insert_participant(
        &self,
        participant: StudyParticipant,
        expected_version: u64,
    ) -> Result<StudyWrite, RepositoryError>;
    fn update_participant(
        &self,
        participant: StudyParticipant,
        expected_version: u64,
    ) -> Result<StudyWrite, RepositoryError>;
}

#[derive(Default)]
struct StudyTables {
    studies: BTreeMap<StudyId, ResearchStudy>,
    participants: BTreeMap<StudyId, Vec<StudyParticipant>>,
}

impl StudyTables {
    fn checked_study(
        &self,
        id: &StudyId,
        expected_version: u64,
    ) -> Result<&ResearchStudy, RepositoryError> {
        let study = self.studies.get(id).ok_or(RepositoryError::NotFound)?;
        if study.version != expected_version {
            return Err(RepositoryError::Conflict);
        }
        Ok(study)
    }

    fn recount(&mut self, id: &StudyId) -> Result<ResearchStudy, RepositoryError> {
        let enrolled = self
            .participants
            .get(id)
            .map(|rows| rows.iter().filter(|row| row.is_enrolled()).count())
            .unwrap_or(0);
        let study = self.studies.get_mut(id).ok_or(RepositoryError::NotFound)?;
        study.current_enrollment = u32::try_from(enrolled)
            .map_err(|_| RepositoryError::Unavailable("enrollment count overflow".to_string()))?;
        study.version += 1;
        Ok(study.clone())
    }
}

/// Mutex-backed store; one lock covers the version check, the write, and the recount.
#[derive(Default)]
pub struct InMemoryStudyRepository {
    tables: Mutex<StudyTables>,
}

impl InMemoryStudyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_study(&self, study: ResearchStudy) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if tables.studies.contains_key(&study.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.studies.insert(study.id.clone(), study);
        Ok(())
    }

    /// Loads existing participants and recounts each touched study once.
    pub fn seed_participants(
        &self,
        participants: Vec<StudyParticipant>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let mut touched = Vec::new();
        for participant in participants {
            if !tables.studies.contains_key(&participant.study_id) {
                return Err(RepositoryError::NotFound);
            }
            if !touched.contains(&participant.study_id) {
                touched.push(participant.study_id.clone());
            }
            tables
                .participants
                .entry(participant.study_id.clone())
                .or_default()
                .push(participant);
        }
        for study_id in touched {
            tables.recount(&study_id)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StudyTables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("study store mutex poisoned".to_string()))
    }
}

impl StudyRepository for InMemoryStudyRepository {
    fn get_study(&self, id: &StudyId) -> Result<Option<ResearchStudy>, RepositoryError> {
        Ok(self.lock()?.studies.get(id).cloned())
    }

    fn list_participants(
        &self,
        study_id: &StudyId,
    ) -> Result<Vec<StudyParticipant>, RepositoryError> {
        Ok(self
            .lock()?
            .participants
            .get(study_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_participant(
        &self,
        study_id: &StudyId,
        participant_id: &ParticipantId,
    ) -> Result<Option<StudyParticipant>, RepositoryError> {
        Ok(self.lock()?.participants.get(study_id).and_then(|rows| {
            rows.iter()
                .find(|row| &row.id == participant_id)
                .cloned()
        }))
    }

    fn insert_participant(
        &self,
        participant: StudyParticipant,
        expected_version: u64,
    ) -> Result<StudyWrite, RepositoryError> {
        let mut tables = self.lock()?;
        tables.checked_study(&participant.study_id, expected_version)?;

        let rows = tables
            .participants
            .entry(participant.study_id.clone())
            .or_default();
        if rows.iter().any(|row| row.id == participant.id) {
            return Err(RepositoryError::Conflict);
        }
        rows.push(participant.clone());

        let study = tables.recount(&participant.study_id)?;
        Ok(StudyWrite { study, participant })
    }

    fn update_participant(
        &self,
        participant: StudyParticipant,
        expected_version: u64,
    ) -> Result<StudyWrite, RepositoryError> {
        let mut tables = self.lock()?;
        tables.checked_study(&participant.study_id, expected_version)?;

        let stored = tables
            .participants
            .get_mut(&participant.study_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.id == participant.id))
            .ok_or(RepositoryError::NotFound)?;
        *stored = participant.clone();

        let study = tables.recount(&participant.study_id)?;
        Ok(StudyWrite { study, participant })
    }
}
