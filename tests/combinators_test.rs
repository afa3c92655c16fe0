#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use promise_aplus::{
        deferred, rejected, resolved, scheduler, Error, Promise, Resolution, Settled,
    };

    type P = Promise<i32, Error>;

    fn settle<T: Clone, E: Clone>(promise: &Promise<T, E>) -> Option<Result<T, E>> {
        scheduler::run_until_idle();
        promise.clone().now_or_never()
    }

    fn reason(text: &str) -> Error {
        Error::reason(text)
    }

    fn value(v: i32) -> Resolution<i32, Error> {
        Resolution::Value(v)
    }

    #[test]
    fn test_all_of_nothing_fulfills_immediately() {
        let all = P::all(Vec::<Resolution<i32, Error>>::new());
        assert_eq!(all.now_or_never(), Some(Ok(vec![])));
    }

    #[test]
    fn test_all_of_plain_values_fulfills_immediately() {
        let all = P::all(vec![1, 2, 3]);
        assert_eq!(all.now_or_never(), Some(Ok(vec![1, 2, 3])));
    }

    #[test]
    fn test_all_rejects_with_the_rejection() {
        let all = P::all(vec![
            value(1),
            resolved::<i32, Error>(2).into(),
            rejected::<i32, Error>(reason("e")).into(),
        ]);
        assert_eq!(settle(&all), Some(Err(reason("e"))));
    }

    #[test]
    fn test_all_keeps_input_order() {
        let first = deferred::<i32, Error>();
        let second = deferred::<i32, Error>();
        let all = P::all(vec![
            first.promise().clone().into(),
            value(2),
            second.promise().clone().into(),
        ]);
        second.resolve(3);
        assert_eq!(settle(&all), None);
        first.resolve(1);
        assert_eq!(settle(&all), Some(Ok(vec![1, 2, 3])));
    }

    #[test]
    fn test_all_rejects_with_first_arrival_not_first_input() {
        let first = deferred::<i32, Error>();
        let second = deferred::<i32, Error>();
        let all = P::all(vec![first.promise().clone(), second.promise().clone()]);
        second.reject(reason("second"));
        assert_eq!(settle(&all), Some(Err(reason("second"))));
        first.reject(reason("first"));
        assert_eq!(settle(&all), Some(Err(reason("second"))));
    }

    #[test]
    fn test_all_ignores_results_after_rejection() {
        let slow = deferred::<i32, Error>();
        let all = P::all(vec![
            rejected::<i32, Error>(reason("early")),
            slow.promise().clone(),
        ]);
        assert_eq!(settle(&all), Some(Err(reason("early"))));
        slow.resolve(1);
        assert_eq!(settle(&all), Some(Err(reason("early"))));
    }

    #[test]
    fn test_all_adopts_thenables() {
        let all = P::all(vec![
            Resolution::<i32, Error>::thenable(|resolve, _| {
                resolve.resolve(10);
                Ok(())
            }),
            value(20),
        ]);
        assert_eq!(settle(&all), Some(Ok(vec![10, 20])));
    }

    #[test]
    fn test_all_accepts_any_iterator() {
        let all = P::all((1..=4).map(|i| resolved::<i32, Error>(i * i)));
        assert_eq!(settle(&all), Some(Ok(vec![1, 4, 9, 16])));
    }

    #[test]
    fn test_all_settled_keeps_input_order() {
        let all = P::all_settled(vec![
            resolved::<i32, Error>(1),
            rejected::<i32, Error>(reason("e")),
        ]);
        assert_eq!(
            settle(&all),
            Some(Ok(vec![
                Settled::Fulfilled(1),
                Settled::Rejected(reason("e"))
            ]))
        );
    }

    #[test]
    fn test_all_settled_regardless_of_completion_order() {
        let first = deferred::<i32, Error>();
        let second = deferred::<i32, Error>();
        let all = P::all_settled(vec![
            first.promise().clone().into(),
            value(0),
            second.promise().clone().into(),
        ]);
        second.reject(reason("late"));
        assert_eq!(settle(&all), None);
        first.resolve(1);
        let outcomes = settle(&all).expect("all_settled is still pending");
        let outcomes = outcomes.expect("all_settled never rejects");
        let statuses: Vec<_> = outcomes.iter().map(Settled::status).collect();
        assert_eq!(statuses, vec!["fulfilled", "fulfilled", "rejected"]);
        assert_eq!(outcomes[0].value(), Some(&1));
        assert_eq!(outcomes[1].value(), Some(&0));
        assert_eq!(outcomes[2].reason(), Some(&reason("late")));
    }

    #[test]
    fn test_all_settled_of_nothing_fulfills_immediately() {
        let all = P::all_settled(Vec::<P>::new());
        assert_eq!(all.now_or_never(), Some(Ok(vec![])));
    }

    #[test]
    fn test_race_plain_value_wins_over_pending() {
        let slow = deferred::<&'static str, Error>();
        let race = Promise::<&'static str, Error>::race(vec![
            slow.promise().clone().into(),
            Resolution::<&'static str, Error>::Value("fast"),
        ]);
        assert_eq!(settle(&race), Some(Ok("fast")));
        slow.reject(reason("slow"));
        assert_eq!(settle(&race), Some(Ok("fast")));
    }

    #[test]
    fn test_race_first_plain_value_wins() {
        let race = P::race(vec![1, 2, 3]);
        assert_eq!(race.now_or_never(), Some(Ok(1)));
    }

    #[test]
    fn test_race_settles_like_the_first_to_settle() {
        let first = deferred::<i32, Error>();
        let second = deferred::<i32, Error>();
        let race = P::race(vec![first.promise().clone(), second.promise().clone()]);
        assert_eq!(settle(&race), None);
        second.reject(reason("second"));
        first.resolve(1);
        assert_eq!(settle(&race), Some(Err(reason("second"))));
    }

    #[test]
    fn test_race_of_nothing_stays_pending() {
        let race = P::race(Vec::<P>::new());
        assert_eq!(settle(&race), None);
    }
}
