use crate::{
    error::Result,
    traits::MessageWriter,
    types::{
        Category, CategoryList, OutboundMessage, RefreshProcessed, RefreshSignal,
        CATEGORY_LIST_KEY, REFRESH_PROCESSED_KEY,
    },
};

/// Summary notifications sent at the end of a refresh cycle.
pub trait RefreshNotifier {
    /// Announce that every record of `signal`'s refresh has been published.
    fn notify_completion(&self, signal: &RefreshSignal) -> Result<()>;

    /// Publish the category reference list for `year`.
    fn notify_categories(&self, categories: &[Category], year: i32) -> Result<()>;
}

/// Publishes each notification as a single message. No retry; publish
/// errors are returned as-is.
pub struct BusNotifier<W> {
    writer: W,
}

impl<W: MessageWriter> BusNotifier<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: MessageWriter> RefreshNotifier for BusNotifier<W> {
    fn notify_completion(&self, signal: &RefreshSignal) -> Result<()> {
        let event = RefreshProcessed::from(signal);
        let message = OutboundMessage::json(REFRESH_PROCESSED_KEY, &event)?;
        self.writer.publish_batch(std::slice::from_ref(&message))
    }

    fn notify_categories(&self, categories: &[Category], year: i32) -> Result<()> {
        let event = CategoryList {
            year,
            categories: categories.to_vec(),
        };
        let message = OutboundMessage::json(CATEGORY_LIST_KEY, &event)?;
        self.writer.publish_batch(std::slice::from_ref(&message))
    }
}

impl<N: RefreshNotifier + ?Sized> RefreshNotifier for &N {
    fn notify_completion(&self, signal: &RefreshSignal) -> Result<()> {
        (**self).notify_completion(signal)
    }

    fn notify_categories(&self, categories: &[Category], year: i32) -> Result<()> {
        (**self).notify_categories(categories, year)
    }
}
