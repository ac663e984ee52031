//! Builder customizers run after configuration resolution and always win.

use crate::client::builder::ClientBuilder;

pub trait BuilderCustomizer: Send + Sync {
    fn customize(&self, builder: &mut ClientBuilder);

    fn order(&self) -> i32 {
        0
    }
}

impl<F> BuilderCustomizer for F
where
    F: Fn(&mut ClientBuilder) + Send + Sync,
{
    fn customize(&self, builder: &mut ClientBuilder) {
        self(builder)
    }
}
