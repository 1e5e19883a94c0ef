use async_trait::async_trait;
use anyhow::Result;
use crate::lesson::search::search;
use crate::lesson::{Lesson, LessonStats, LessonUpdate, NewLesson, SearchHit, SearchQuery};
use crate::web::Pagination;
pub mod entity;
pub mod mapping;
pub mod memory;
pub mod sqlite;

pub use memory::InMemoryLessonStore;
pub use sqlite::SqliteLessonStore;

/// Persistence boundary for lessons and their stage payloads.
///
/// `update` replaces only the fields present in the [`LessonUpdate`] and is
/// atomic per call. Updating an unknown id is an error.
#[async_trait]
pub trait LessonStore: Send + Sync + 'static {
    async fn create(&self, lesson: NewLesson) -> Result<Lesson>;
    async fn get(&self, id: i64) -> Result<Option<Lesson>>;
    async fn update(&self, id: i64, update: LessonUpdate) -> Result<Lesson>;
    /// One page in id order, optionally restricted to a course.
    async fn list(&self, course_id: Option<i64>, pagination: &Pagination) -> Result<Vec<Lesson>>;
    /// Every lesson in id order.
    async fn all(&self) -> Result<Vec<Lesson>>;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        Ok(search(&self.all().await?, query))
    }

    async fn stats(&self) -> Result<LessonStats> {
        Ok(LessonStats::tally(&self.all().await?))
    }
}
