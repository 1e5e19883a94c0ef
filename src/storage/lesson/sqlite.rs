use async_trait::async_trait;
use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    NotSet, QueryFilter, QueryOrder, QuerySelect, Schema, Set,
};
use tracing::info;

use super::entity::{self, Entity as LessonEntity};
use super::mapping::apply_update;
use super::LessonStore;
use crate::lesson::{Lesson, LessonUpdate, NewLesson};
use crate::web::Pagination;

pub struct SqliteLessonStore {
    pub(super) db: DatabaseConnection,
}

impl SqliteLessonStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Initializing SQLite lesson storage at {}", database_url);
        let db = Database::connect(database_url).await?;

        // 创建课程表
        let backend = db.get_database_backend();
        let mut create = Schema::new(backend).create_table_from_entity(LessonEntity);
        create.if_not_exists();
        db.execute(backend.build(&create)).await?;

        Ok(Self { db })
    }

    async fn find(&self, id: i64) -> Result<Option<entity::Model>> {
        Ok(LessonEntity::find_by_id(id).one(&self.db).await?)
    }
}

#[async_trait]
impl LessonStore for SqliteLessonStore {
    async fn create(&self, lesson: NewLesson) -> Result<Lesson> {
        let active = entity::ActiveModel {
            id: NotSet,
            title: Set(lesson.title),
            filename: Set(lesson.filename),
            course_id: Set(lesson.course_id),
            date: Set(lesson.date),
            duration: Set(lesson.duration),
            transcript: Set(None),
            transcript_metadata: Set(None),
            corrected_transcript: Set(None),
            correction_metadata: Set(None),
            summary: Set(None),
            summary_metadata: Set(None),
        };
        let model = active.insert(&self.db).await?;
        info!("Created lesson {}", model.id);
        Ok(model.into())
    }

    async fn get(&self, id: i64) -> Result<Option<Lesson>> {
        Ok(self.find(id).await?.map(Lesson::from))
    }

    async fn update(&self, id: i64, update: LessonUpdate) -> Result<Lesson> {
        let model = self
            .find(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Lesson {} not found", id))?;

        if update.is_empty() {
            return Ok(model.into());
        }

        // a single UPDATE carries every provided column
        let mut active: entity::ActiveModel = model.into();
        apply_update(&mut active, update)?;
        let model = active.update(&self.db).await?;
        Ok(model.into())
    }

    async fn list(&self, course_id: Option<i64>, pagination: &Pagination) -> Result<Vec<Lesson>> {
        let pagination = pagination.check();
        let mut query = LessonEntity::find();
        if let Some(course_id) = course_id {
            query = query.filter(entity::Column::CourseId.eq(course_id));
        }
        let models = query
            .order_by_asc(entity::Column::Id)
            .offset(pagination.offset())
            .limit(pagination.limit())
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Lesson::from).collect())
    }

    async fn all(&self) -> Result<Vec<Lesson>> {
        let models = LessonEntity::find()
            .order_by_asc(entity::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Lesson::from).collect())
    }
}
