// THEORY:
// The `parallel_pipeline` fans the independent filters of one frame out over a
// pool of tokio workers. Filters are pure and allocate their own output, so the
// only shared data is the read-only source frame behind an `Arc`.
//
// Key architectural principles:
// 1.  **Single Dispatcher**: One task receives every `FilterTask` and hands them
//     to the workers round-robin, each worker owning its own queue.
// 2.  **Reply Per Task**: Every task carries a `oneshot` sender. The caller
//     awaits the receivers in submission order, so results come back in the
//     order the filters were requested no matter which worker finished first.
// 3.  **Blocking Work Off The Executor**: Each worker awaits its filter on
//     tokio's blocking pool, so a slow filter never stalls the dispatcher, even
//     on a current-thread runtime.
// 4.  **Graceful Drain**: Dropping the submission channel ends the dispatcher,
//     which drops the worker queues, which ends the workers. `shutdown` waits
//     for that chain to finish.

use crate::config::{EngineConfig, ThresholdTarget};
use crate::core_modules::filter::Filter;
use crate::core_modules::frame::frame::PixelBuffer;
use crate::core_modules::pixel::pixel::Threshold;
use crate::error::{Result, VisionError};
use crate::pipeline::gallery_filters;
use futures::future::join_all;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct FilterTask {
    pub frame: Arc<PixelBuffer>,
    pub filter: Filter,
    pub result_sender: oneshot::Sender<Result<PixelBuffer>>,
}

pub struct FilterWorkerPool {
    task_sender: mpsc::UnboundedSender<FilterTask>,
    dispatcher: tokio::task::JoinHandle<()>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl FilterWorkerPool {
    /// Spawns `worker_count` workers. Must be called inside a tokio runtime.
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(VisionError::invalid("worker_count", "must be positive"));
        }
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FilterTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FilterTask>())
            .unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!("filter worker {worker_idx} has stopped, dropping task");
                }
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(id, mut worker_receiver)| {
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let FilterTask {
                            frame,
                            filter,
                            result_sender,
                        } = task;
                        // Filters are CPU-bound; keep them off the async executor threads.
                        let output = tokio::task::spawn_blocking(move || filter.apply(frame.view()))
                            .await
                            .unwrap_or_else(|_| Err(VisionError::WorkerPool("Filter task panicked")));
                        // The caller may have given up waiting; nothing to do then.
                        let _ = result_sender.send(output);
                    }
                    debug!("filter worker {id} drained");
                })
            })
            .collect();

        debug!("filter worker pool started with {worker_count} workers");
        Ok(Self {
            task_sender,
            dispatcher,
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    async fn submit(&self, frame: Arc<PixelBuffer>, filter: Filter) -> Result<PixelBuffer> {
        let (result_sender, result_receiver) = oneshot::channel();

        let task = FilterTask {
            frame,
            filter,
            result_sender,
        };

        self.task_sender
            .send(task)
            .map_err(|_| VisionError::WorkerPool("Failed to send task to worker pool"))?;

        result_receiver
            .await
            .map_err(|_| VisionError::WorkerPool("Failed to receive result from worker"))?
    }

    /// Applies every filter to `frame`, returning results in `filters` order.
    pub async fn process_frame(&self, frame: Arc<PixelBuffer>, filters: Vec<Filter>) -> Result<Vec<(Filter, PixelBuffer)>> {
        let pending = filters.iter().map(|&filter| self.submit(Arc::clone(&frame), filter));
        let outputs = join_all(pending).await;
        filters
            .into_iter()
            .zip(outputs)
            .map(|(filter, output)| Ok((filter, output?)))
            .collect()
    }

    /// Stops accepting work and waits for every worker to finish its queue.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.task_sender);
        self.dispatcher
            .await
            .map_err(|_| VisionError::WorkerPool("Dispatcher task panicked"))?;
        for worker in self.workers {
            worker
                .await
                .map_err(|_| VisionError::WorkerPool("Worker task panicked"))?;
        }
        Ok(())
    }
}

/// Async counterpart of `FilterPipeline` for the filter gallery.
pub struct ParallelPipeline {
    config: EngineConfig,
    worker_pool: FilterWorkerPool,
}

impl ParallelPipeline {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let worker_pool = FilterWorkerPool::new(config.workers())?;
        Ok(Self { config, worker_pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_threshold(&mut self, target: ThresholdTarget, value: i64) -> Result<()> {
        self.config.thresholds.set(target, Threshold::new(value)?);
        Ok(())
    }

    pub async fn process_frame(&self, frame: Arc<PixelBuffer>, filters: Vec<Filter>) -> Result<Vec<(Filter, PixelBuffer)>> {
        self.worker_pool.process_frame(frame, filters).await
    }

    /// Same views, in the same order, as `FilterPipeline::gallery`.
    pub async fn gallery(&self, frame: Arc<PixelBuffer>) -> Result<Vec<(Filter, PixelBuffer)>> {
        self.process_frame(frame, gallery_filters(&self.config)).await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.worker_pool.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::ColourChannel;
    use crate::pipeline::FilterPipeline;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let data = (0..width * height)
            .flat_map(|i| {
                let (x, y) = (i % width, i / width);
                [(x * 9) as u8, (y * 11) as u8, ((x + y) * 5) as u8, 255]
            })
            .collect();
        PixelBuffer::new(data, width, height).unwrap()
    }

    #[tokio::test]
    async fn results_keep_request_order() {
        let pool = FilterWorkerPool::new(3).unwrap();
        let frame = Arc::new(gradient(16, 12));
        let filters = vec![
            Filter::BoxBlur,
            Filter::Greyscale,
            Filter::Pixelate { block_size: 4 },
            Filter::ChannelSplit {
                channel: ColourChannel::Blue,
                threshold: None,
            },
            Filter::RgbToXyz { threshold: None },
        ];

        let results = pool.process_frame(Arc::clone(&frame), filters.clone()).await.unwrap();
        assert_eq!(results.len(), filters.len());
        for ((filter, output), expected) in results.iter().zip(&filters) {
            assert_eq!(filter, expected);
            assert_eq!(output, &expected.apply(frame.view()).unwrap());
        }
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn gallery_matches_the_sync_pipeline() {
        let config = EngineConfig {
            worker_count: Some(4),
            ..EngineConfig::default()
        };
        let frame = Arc::new(gradient(20, 20));
        let sync = FilterPipeline::new(config.clone()).unwrap();
        let parallel = ParallelPipeline::new(config).unwrap();

        let expected = sync.gallery(frame.view()).unwrap();
        let actual = parallel.gallery(Arc::clone(&frame)).await.unwrap();
        assert_eq!(actual, expected);
        parallel.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn filter_errors_are_returned_to_the_caller() {
        let pool = FilterWorkerPool::new(2).unwrap();
        let frame = Arc::new(gradient(4, 4));
        let err = pool
            .process_frame(frame, vec![Filter::Greyscale, Filter::Pixelate { block_size: 0 }])
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::InvalidParameter { name: "block_size", .. }));
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn threshold_changes_reach_the_parallel_gallery() {
        let mut pipeline = ParallelPipeline::new(EngineConfig {
            worker_count: Some(2),
            ..EngineConfig::default()
        })
        .unwrap();
        pipeline.set_threshold(ThresholdTarget::Xyz, 10).unwrap();
        let gallery = pipeline.gallery(Arc::new(gradient(4, 4))).await.unwrap();
        assert_eq!(
            gallery[9].0,
            Filter::RgbToXyz {
                threshold: Some(Threshold::new(10).unwrap()),
            }
        );
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn single_thread_runtime_keeps_dispatching_while_filters_run() {
        let pool = FilterWorkerPool::new(2).unwrap();
        let frame = Arc::new(gradient(64, 64));
        let filters = vec![Filter::BoxBlur; 6];
        let results = pool.process_frame(Arc::clone(&frame), filters).await.unwrap();
        let expected = Filter::BoxBlur.apply(frame.view()).unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|(_, output)| output == &expected));
        pool.shutdown().await.unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            assert!(FilterWorkerPool::new(0).is_err());
        });
    }
}
