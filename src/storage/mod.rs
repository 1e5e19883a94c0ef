pub mod audio;
pub mod lesson;

pub use audio::AudioLibrary;
pub use lesson::{InMemoryLessonStore, LessonStore, SqliteLessonStore};
