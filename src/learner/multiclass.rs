//! One-vs-rest composition of binary learners

use log::info;

use crate::core::{Datapoint, Dataset, Grouper, Hyperparameter, Learner, RermError, Result};

/// One binary model per group label, each trained with that group as +1
/// and every other point as -1. The predicted group is the label whose
/// model scores highest.
#[derive(Debug, Clone)]
pub struct OneVsRest<L: Learner + Clone> {
    template: L,
    models: Vec<(i32, L)>,
}

impl<L: Learner + Clone> OneVsRest<L> {
    pub fn new(template: L) -> Self {
        Self {
            template,
            models: Vec::new(),
        }
    }

    /// Fitted binary models keyed by group label, in ascending label order
    pub fn models(&self) -> &[(i32, L)] {
        &self.models
    }

    pub fn groups(&self) -> Vec<i32> {
        self.models.iter().map(|(g, _)| *g).collect()
    }

    /// Label and score of the best-scoring model
    fn best(&self, point: &Datapoint) -> Result<(i32, f64)> {
        if self.models.is_empty() {
            return Err(RermError::ModelNotTrained);
        }
        let mut best = (self.models[0].0, f64::NEG_INFINITY);
        for (group, model) in &self.models {
            let score = model.score(point)?;
            if score > best.1 {
                best = (*group, score);
            }
        }
        Ok(best)
    }
}

impl<L: Learner + Clone> Learner for OneVsRest<L> {
    fn learn(&mut self, dataset: &Dataset) -> Result<()> {
        if dataset.is_empty() {
            return Err(RermError::EmptyDataset);
        }
        if dataset.iter().any(|p| p.group.is_none()) {
            return Err(RermError::InvalidParameter(
                "one-vs-rest needs a group on every point".to_string(),
            ));
        }
        let groups: Vec<i32> = dataset.group_counts().keys().copied().collect();
        if groups.len() < 2 {
            return Err(RermError::InvalidParameter(format!(
                "one-vs-rest needs at least two groups, found {}",
                groups.len()
            )));
        }

        let mut models = Vec::with_capacity(groups.len());
        for group in groups {
            let binary = dataset.relabeled(|p| if p.group == Some(group) { 1 } else { -1 });
            let mut model = self.template.clone();
            model.learn(&binary)?;
            models.push((group, model));
        }
        info!("Trained {} one-vs-rest models", models.len());
        self.models = models;
        Ok(())
    }

    fn score(&self, point: &Datapoint) -> Result<f64> {
        self.best(point).map(|(_, score)| score)
    }

    fn predict_point(&self, point: &mut Datapoint) -> Result<f64> {
        let (group, score) = self.best(point)?;
        point.predicted_value = Some(score);
        point.predicted_group = Some(group);
        Ok(score)
    }

    fn grouper(&self) -> Option<Grouper> {
        None
    }

    fn set_grouper(&mut self, _grouper: Option<Grouper>) {}

    fn is_trained(&self) -> bool {
        !self.models.is_empty()
    }

    fn tunable(&self, param: Hyperparameter) -> Result<f64> {
        self.template.tunable(param)
    }

    /// Applies to the template; takes effect at the next `learn`
    fn set_tunable(&mut self, param: Hyperparameter, value: f64) -> Result<()> {
        self.template.set_tunable(param, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::LinearLearner;
    use crate::solver::SolverKind;

    fn three_clusters() -> Dataset {
        let centers = [(0.0, 4.0, 1), (4.0, -2.0, 2), (-4.0, -2.0, 3)];
        let mut points = Vec::new();
        for (i, (cx, cy, group)) in centers.iter().enumerate() {
            for k in 0..8 {
                let angle = k as f64 * 0.785 + i as f64;
                points.push(Datapoint::labeled(
                    vec![cx + 0.5 * angle.cos(), cy + 0.5 * angle.sin()],
                    *group,
                ));
            }
        }
        Dataset::from_points("clusters", points).unwrap()
    }

    #[test]
    fn test_one_vs_rest_separates_clusters() {
        let template = LinearLearner::new()
            .with_solver(SolverKind::Ridge)
            .with_lambda2(1e-3);
        let mut ovr = OneVsRest::new(template);
        let mut data = three_clusters();
        ovr.learn(&data).unwrap();
        assert_eq!(ovr.groups(), vec![1, 2, 3]);

        ovr.predict(&mut data).unwrap();
        assert_eq!(data.num_correct_predictions(), data.len());
    }

    #[test]
    fn test_one_vs_rest_needs_two_groups() {
        let points = vec![
            Datapoint::labeled(vec![1.0], 1),
            Datapoint::labeled(vec![2.0], 1),
        ];
        let data = Dataset::from_points("single", points).unwrap();
        let mut ovr = OneVsRest::new(LinearLearner::new());
        assert!(ovr.learn(&data).is_err());
        assert!(matches!(
            ovr.score(&Datapoint::new(vec![1.0])),
            Err(RermError::ModelNotTrained)
        ));
    }

    #[test]
    fn test_tunable_forwarded_to_template() {
        let mut ovr = OneVsRest::new(LinearLearner::new());
        ovr.set_tunable(Hyperparameter::Lambda2, 0.25).unwrap();
        assert_eq!(ovr.tunable(Hyperparameter::Lambda2).unwrap(), 0.25);
    }
}
