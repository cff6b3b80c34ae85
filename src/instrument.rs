//! Call counting and call history for methods backed by a [`KeyValueStore`].
//!
//! A method is identified by its qualified name, like `Cache.store`. The counter lives under the qualified name itself,
//! the rendered arguments of each call are pushed onto `<qualname>:inputs` and the rendered results onto
//! `<qualname>:outputs`. [`replay()`] reads all three back.

use std::fmt::Display;
use std::fmt::Formatter;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::kv::KeyValueStore;
use crate::types::Result;
use crate::value::FromStoredBytes;

pub fn count_key(qualname: &str) -> String {
    qualname.to_string()
}

pub fn inputs_key(qualname: &str) -> String {
    format!("{qualname}:inputs")
}

pub fn outputs_key(qualname: &str) -> String {
    format!("{qualname}:outputs")
}

/// Which decorations are applied to a tracked method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracking {
    pub count_calls:  bool,
    pub call_history: bool,
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            count_calls:  true,
            call_history: true,
        }
    }
}

impl Tracking {
    pub fn none() -> Self {
        Self {
            count_calls:  false,
            call_history: false,
        }
    }
}

/// Renders call arguments as a parenthesized list: `("foo", 42)`.
pub fn render_args<A: Display>(args: &[A]) -> String {
    let list = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
    format!("({list})")
}

#[derive(Debug)]
pub struct CallTracker<S>
where
    S: KeyValueStore,
{
    store:    Arc<S>,
    qualname: String,
    tracking: Tracking,
}

impl<S> CallTracker<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>, qualname: impl Into<String>, tracking: Tracking) -> Self {
        Self {
            store,
            qualname: qualname.into(),
            tracking,
        }
    }

    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    /// Run `call` with the configured decorations around it. The counter and the inputs are recorded before the call;
    /// the output only when the call succeeds.
    pub async fn track<A, T, F, Fut>(&self, args: &[A], call: F) -> Result<T>
    where
        A: Display,
        T: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.tracking.count_calls {
            let count = self.store.incr(&count_key(&self.qualname)).await?;
            debug!("{} call #{count}", self.qualname);
        }

        if self.tracking.call_history {
            self.store
                .rpush(&inputs_key(&self.qualname), render_args(args).into_bytes())
                .await?;
        }

        let output = call().await?;

        if self.tracking.call_history {
            self.store
                .rpush(&outputs_key(&self.qualname), output.to_string().into_bytes())
                .await?;
        }

        Ok(output)
    }
}

/// Reads an `INCR`-maintained counter. A missing key counts as `0`; anything that isn't an integer is an
/// [`Error::Decode`](crate::types::Error::Decode).
pub async fn read_counter<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<i64> {
    match store.get(key).await? {
        Some(bytes) => i64::from_stored_bytes(key, bytes),
        None => Ok(0),
    }
}

pub async fn call_count<S: KeyValueStore + ?Sized>(store: &S, qualname: &str) -> Result<i64> {
    read_counter(store, &count_key(qualname)).await
}

/// Recorded history of a tracked method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub qualname: String,
    pub count:    i64,
    pub calls:    Vec<(String, String)>,
}

pub async fn replay<S: KeyValueStore + ?Sized>(store: &S, qualname: &str) -> Result<Replay> {
    let count = call_count(store, qualname).await?;
    let inputs = store.lrange(&inputs_key(qualname), 0, -1).await?;
    let outputs = store.lrange(&outputs_key(qualname), 0, -1).await?;

    let calls = inputs
        .into_iter()
        .zip(outputs)
        .map(|(i, o)| {
            (
                String::from_utf8_lossy(&i).into_owned(),
                String::from_utf8_lossy(&o).into_owned(),
            )
        })
        .collect();

    Ok(Replay {
        qualname: qualname.to_string(),
        count,
        calls,
    })
}

impl Display for Replay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} was called {} times:", self.qualname, self.count)?;
        for (inputs, output) in &self.calls {
            write!(f, "\n{}{inputs} -> {output}", self.qualname)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::types::nderr;

    #[tokio::test]
    async fn test_track_records_everything() {
        let store = Arc::new(MemoryStore::new());
        let tracker = CallTracker::new(store.clone(), "Thing.do", Tracking::default());

        let out = tracker.track(&["a", "b"], || async { Ok(7) }).await.unwrap();
        assert_eq!(out, 7);
        tracker.track(&[1], || async { Ok("x") }).await.unwrap();

        let replay = replay(store.as_ref(), "Thing.do").await.unwrap();
        assert_eq!(replay.count, 2);
        assert_eq!(
            replay.calls,
            vec![("(a, b)".to_string(), "7".to_string()), ("(1)".to_string(), "x".to_string())]
        );
        assert_eq!(
            replay.to_string(),
            "Thing.do was called 2 times:\nThing.do(a, b) -> 7\nThing.do(1) -> x"
        );
    }

    #[tokio::test]
    async fn test_failed_call_has_no_output() {
        let store = Arc::new(MemoryStore::new());
        let tracker = CallTracker::new(store.clone(), "Thing.fail", Tracking::default());

        let res: Result<i64> = tracker.track(&["z"], || async { Err(nderr!("boom")) }).await;
        assert!(res.is_err());

        assert_eq!(call_count(store.as_ref(), "Thing.fail").await.unwrap(), 1);
        assert_eq!(store.lrange(&inputs_key("Thing.fail"), 0, -1).await.unwrap().len(), 1);
        assert!(store.lrange(&outputs_key("Thing.fail"), 0, -1).await.unwrap().is_empty());
        assert!(replay(store.as_ref(), "Thing.fail").await.unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn test_decorations_are_optional() {
        let store = Arc::new(MemoryStore::new());
        let counting = Tracking {
            count_calls:  true,
            call_history: false,
        };
        let tracker = CallTracker::new(store.clone(), "Only.count", counting);
        tracker.track(&[0], || async { Ok(0) }).await.unwrap();
        tracker.track(&[0], || async { Ok(0) }).await.unwrap();

        assert_eq!(call_count(store.as_ref(), "Only.count").await.unwrap(), 2);
        assert!(store.lrange(&inputs_key("Only.count"), 0, -1).await.unwrap().is_empty());

        let bare = CallTracker::new(store.clone(), "Bare", Tracking::none());
        bare.track(&[0], || async { Ok(0) }).await.unwrap();
        assert_eq!(replay(store.as_ref(), "Bare").await.unwrap().to_string(), "Bare was called 0 times:");
    }
}
