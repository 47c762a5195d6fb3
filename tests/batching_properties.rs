mod common;

use std::sync::Arc;

use batchrun::engine::scheduler::{halve, partition};
use batchrun::engine::BatchScheduler;
use batchrun::types::ExecutionMode;
use batchrun_test_utils::fake_invoker::{FailWhen, FakeInvoker};
use common::{fake_command, image_set};
use proptest::prelude::*;

proptest! {
    #[test]
    fn partition_is_contiguous_and_bounded(len in 0usize..500, batch in 1usize..80) {
        let ranges = partition(len, batch);
        prop_assert_eq!(ranges.len(), len.div_ceil(batch));

        let mut next = 0;
        for r in &ranges {
            prop_assert_eq!(r.start, next);
            prop_assert!(!r.is_empty() && r.len() <= batch);
            next = r.end;
        }
        prop_assert_eq!(next, len);
    }

    #[test]
    fn halving_covers_the_failed_batch(start in 0usize..1000, len in 1usize..200) {
        let range = start..start + len;
        match halve(&range) {
            None => prop_assert_eq!(len, 1),
            Some(subs) => {
                prop_assert_eq!(subs.len(), 2);
                prop_assert!(subs.iter().all(|r| !r.is_empty()));
                prop_assert_eq!(subs.first().map(|r| r.start), Some(range.start));
                prop_assert_eq!(subs.last().map(|r| r.end), Some(range.end));
                let total: usize = subs.iter().map(|r| r.len()).sum();
                prop_assert_eq!(total, len);
                prop_assert!(subs.iter().all(|r| r.len() <= len.div_ceil(2)));
                prop_assert_eq!(subs[0].end, subs[1].start);
            }
        }
    }

    #[test]
    fn every_image_is_either_reported_or_failed(
        count in 1usize..40,
        batch in 1usize..12,
        limit in 0usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let fake = FakeInvoker::new().fail_when(FailWhen::LargerThan(limit));
        let scheduler = BatchScheduler::new(Arc::new(fake), batch, ExecutionMode::Sequential);
        let report = runtime
            .block_on(scheduler.run(&fake_command("m"), &image_set(count)))
            .unwrap();

        let failed: usize = report.failures.iter().map(|f| f.images.len()).sum();
        prop_assert_eq!(report.records.len() + failed, count);
    }
}
