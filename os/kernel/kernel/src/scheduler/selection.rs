use crate::process::Priority;

/// Pick a ready queue for the draw `p ∈ [0, 1)`.
///
/// `ready` holds the queue lengths in [`Priority::ALL`] order. Returns `None`
/// only when all three queues are empty.
///
/// | Realtime  | Interactive | draw          | queue       |
/// |-----------|-------------|---------------|-------------|
/// | non-empty | any         | `p < 0.6`     | Realtime    |
/// | non-empty | non-empty   | `p < 0.9`     | Interactive |
/// | non-empty | any         | otherwise     | Background, or Interactive if that is empty |
/// | empty     | non-empty   | `p < 0.75`    | Interactive |
/// | empty     | non-empty   | otherwise     | Background, or Interactive if that is empty |
/// | empty     | empty       | any           | Background  |
///
/// If the table lands on an empty queue, the first non-empty queue in
/// [`Priority::ALL`] order is taken instead.
#[must_use]
pub fn select_queue(p: f64, ready: [usize; 3]) -> Option<Priority> {
    let has = |prio: Priority| ready[prio.index()] > 0;
    let background_or_interactive = if has(Priority::Background) {
        Priority::Background
    } else {
        Priority::Interactive
    };

    let choice = if has(Priority::Realtime) {
        if p < 0.6 {
            Priority::Realtime
        } else if has(Priority::Interactive) && p < 0.9 {
            Priority::Interactive
        } else {
            background_or_interactive
        }
    } else if has(Priority::Interactive) {
        if p < 0.75 {
            Priority::Interactive
        } else {
            background_or_interactive
        }
    } else {
        Priority::Background
    };

    if has(choice) {
        Some(choice)
    } else {
        Priority::ALL.into_iter().find(|&prio| has(prio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Priority::{Background, Interactive, Realtime};

    #[test]
    fn all_three_ready() {
        let ready = [1, 1, 1];
        assert_eq!(select_queue(0.0, ready), Some(Realtime));
        assert_eq!(select_queue(0.59, ready), Some(Realtime));
        assert_eq!(select_queue(0.6, ready), Some(Interactive));
        assert_eq!(select_queue(0.89, ready), Some(Interactive));
        assert_eq!(select_queue(0.9, ready), Some(Background));
    }

    #[test]
    fn realtime_without_interactive() {
        let ready = [1, 0, 1];
        assert_eq!(select_queue(0.3, ready), Some(Realtime));
        assert_eq!(select_queue(0.7, ready), Some(Background));
    }

    #[test]
    fn realtime_alone_falls_back_to_realtime() {
        // lands on empty Interactive, first non-empty is Realtime
        assert_eq!(select_queue(0.95, [2, 0, 0]), Some(Realtime));
    }

    #[test]
    fn no_realtime() {
        assert_eq!(select_queue(0.74, [0, 1, 1]), Some(Interactive));
        assert_eq!(select_queue(0.75, [0, 1, 1]), Some(Background));
        assert_eq!(select_queue(0.99, [0, 1, 0]), Some(Interactive));
        assert_eq!(select_queue(0.1, [0, 0, 3]), Some(Background));
    }

    #[test]
    fn idle_when_everything_is_empty() {
        assert_eq!(select_queue(0.5, [0, 0, 0]), None);
    }
}
