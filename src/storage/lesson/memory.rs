use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use async_trait::async_trait;
use anyhow::Result;

use super::LessonStore;
use crate::lesson::{Lesson, LessonUpdate, NewLesson};
use crate::web::Pagination;

pub struct InMemoryLessonStore {
    lessons: RwLock<HashMap<i64, Lesson>>,
    next_id: AtomicI64,
}

impl InMemoryLessonStore {
    pub fn new() -> Self {
        Self {
            lessons: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryLessonStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LessonStore for InMemoryLessonStore {
    async fn create(&self, lesson: NewLesson) -> Result<Lesson> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let lesson = Lesson {
            id,
            title: lesson.title,
            filename: lesson.filename,
            course_id: lesson.course_id,
            date: lesson.date,
            duration: lesson.duration,
            transcript: None,
            transcript_metadata: None,
            corrected_transcript: None,
            correction_metadata: None,
            summary: None,
            summary_metadata: None,
        };
        let mut lessons = self.lessons.write().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        lessons.insert(id, lesson.clone());
        Ok(lesson)
    }

    async fn get(&self, id: i64) -> Result<Option<Lesson>> {
        let lessons = self.lessons.read().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(lessons.get(&id).cloned())
    }

    async fn update(&self, id: i64, update: LessonUpdate) -> Result<Lesson> {
        let mut lessons = self.lessons.write().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let lesson = lessons
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("Lesson {} not found", id))?;
        update.apply(lesson);
        Ok(lesson.clone())
    }

    async fn list(&self, course_id: Option<i64>, pagination: &Pagination) -> Result<Vec<Lesson>> {
        let pagination = pagination.check();
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|lesson| course_id.is_none() || lesson.course_id == course_id)
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect())
    }

    async fn all(&self) -> Result<Vec<Lesson>> {
        let lessons = self.lessons.read().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let mut all: Vec<Lesson> = lessons.values().cloned().collect();
        all.sort_by_key(|lesson| lesson.id);
        Ok(all)
    }
}
