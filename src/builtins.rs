//! Typed bindings for the engine builtins.
//!
//! Every function here is a thin front end over
//! [`SessionContext::invoke`]: it fixes the required parameters of one
//! operation and converts the resulting handles into their declared types.
//! Everything else is passed through the [`Options`] bag and checked against
//! the schema table in [`builtin_schemas`].

use crate::context::SessionContext;
use crate::error::GraphError;
use crate::graph::OperandType;
use crate::graph::OperandType::{Frame as F, Matrix as M, Scalar as S};
use crate::schema::{OperationSchema, ParamKind as K};
use crate::value::{Frame, List, Matrix, MultiReturn, Options, Scalar, Value};

/// Schemas for every builtin bound in this module.
pub fn builtin_schemas() -> Vec<OperationSchema> {
    vec![
        OperationSchema::new("kmeans")
            .describe("k-Means clustering")
            .required("X", K::Matrix)
            .option("k", K::Integer)
            .option("runs", K::Integer)
            .option("max_iter", K::Integer)
            .option("eps", K::Double)
            .option("is_verbose", K::Boolean)
            .option("avg_sample_size_per_centroid", K::Integer)
            .option("seed", K::Integer)
            .returns(&[M, M]),
        OperationSchema::new("glm")
            .describe("GLM regression with Newton/Fisher scoring and trust regions")
            .required("X", K::Matrix)
            .required("Y", K::Matrix)
            .option("dfam", K::Integer)
            .option("vpow", K::Double)
            .option("link", K::Integer)
            .option("lpow", K::Double)
            .option("yneg", K::Double)
            .option("icpt", K::Integer)
            .option("reg", K::Double)
            .option("tol", K::Double)
            .option("disp", K::Double)
            .option("moi", K::Integer)
            .option("mii", K::Integer)
            .option("verbose", K::Boolean)
            .returns(&[M]),
        OperationSchema::new("outlierByIQR")
            .describe("Outlier detection and repair by inter-quartile range")
            .required("X", K::Matrix)
            .required("k", K::Double)
            .required("max_iterations", K::Integer)
            .option("isIterative", K::Boolean)
            .option("repairMethod", K::Integer)
            .option("verbose", K::Boolean)
            .returns(&[M, M, M, M, S, S]),
        OperationSchema::new("scale")
            .describe("Column-wise centering and z-score scaling")
            .required("X", K::Matrix)
            .option("center", K::Boolean)
            .option("scale", K::Boolean)
            .returns(&[M, M, M]),
        OperationSchema::new("bandit")
            .describe("Pipeline search treating primitives as bandit arms")
            .required("X_train", K::Matrix)
            .required("Y_train", K::Matrix)
            .required("X_test", K::Matrix)
            .required("Y_test", K::Matrix)
            .required("metaList", K::List)
            .required("evaluationFunc", K::Text)
            .required("evalFunHp", K::Matrix)
            .required("lp", K::Frame)
            .required("lpHp", K::Matrix)
            .required("primitives", K::Frame)
            .required("param", K::Frame)
            .required("baseLineScore", K::Double)
            .required("cv", K::Boolean)
            .option("K", K::Integer)
            .option("R", K::Integer)
            .option("cvk", K::Integer)
            .option("verbose", K::Boolean)
            .option("output", K::Text)
            .returns(&[F, M, M, F]),
    ]
}

// The typed wrappers unpack a fixed output signature. A catalog entry that
// declares another one is rejected before the node is pushed.
fn check_signature(
    ctx: &SessionContext,
    operation: &str,
    expected: &[OperandType],
) -> Result<(), GraphError> {
    let declared = &ctx.catalog().get(operation)?.outputs;
    if declared.len() != expected.len() {
        return Err(GraphError::UnexpectedArity {
            expected: expected.len(),
            actual: declared.len(),
        });
    }
    for (index, (&actual, &expected)) in declared.iter().zip(expected).enumerate() {
        if actual != expected {
            return Err(GraphError::OutputTypeMismatch {
                index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

fn invoke_multi(
    ctx: &mut SessionContext,
    operation: &str,
    required: Vec<(&str, Value)>,
    options: Options,
    signature: &[OperandType],
) -> Result<MultiReturn, GraphError> {
    check_signature(ctx, operation, signature)?;
    ctx.invoke(operation, required, options)?
        .into_multi()
        .ok_or(GraphError::UnexpectedArity {
            expected: signature.len(),
            actual: 1,
        })
}

/// k-Means clustering of the rows of `x`.
///
/// Recognized options: `k`, `runs`, `max_iter`, `eps`, `is_verbose`,
/// `avg_sample_size_per_centroid`, `seed` (`-1` picks random seeds).
///
/// Returns the centroids `C` and the record-to-centroid mapping `Y`.
pub fn kmeans(
    ctx: &mut SessionContext,
    x: Matrix,
    options: Options,
) -> Result<(Matrix, Matrix), GraphError> {
    let out = invoke_multi(ctx, "kmeans", vec![("X", x.into())], options, &[M, M])?;
    Ok((out.matrix(0)?, out.matrix(1)?))
}

/// Generalized linear model fit of `y` on `x`.
///
/// Recognized options: `dfam` (1 = power, 2 = binomial), `vpow`, `link`,
/// `lpow`, `yneg`, `icpt` (0, 1 or 2), `reg`, `tol`, `disp`, `moi`, `mii`,
/// `verbose`.
///
/// The returned matrix holds the coefficients `beta`; its shape depends on `icpt`.
pub fn glm(
    ctx: &mut SessionContext,
    x: Matrix,
    y: Matrix,
    options: Options,
) -> Result<Matrix, GraphError> {
    check_signature(ctx, "glm", &[M])?;
    ctx.invoke("glm", vec![("X", x.into()), ("Y", y.into())], options)?
        .into_matrix()
}

/// Outputs of [`outlier_by_iqr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierByIqr {
    pub cleaned: Matrix,
    pub q1: Matrix,
    pub q3: Matrix,
    pub iqr: Matrix,
    pub k: Scalar,
    pub repair_method: Scalar,
}

/// Detects outliers outside `k * IQR` and repairs them.
///
/// `max_iterations` of 0 repeats until no outliers remain. Recognized options:
/// `isIterative`, `repairMethod` (0 = delete rows, 1 = zero, 2 = missing),
/// `verbose`.
pub fn outlier_by_iqr(
    ctx: &mut SessionContext,
    x: Matrix,
    k: f64,
    max_iterations: i64,
    options: Options,
) -> Result<OutlierByIqr, GraphError> {
    let out = invoke_multi(
        ctx,
        "outlierByIQR",
        vec![
            ("X", x.into()),
            ("k", k.into()),
            ("max_iterations", max_iterations.into()),
        ],
        options,
        &[M, M, M, M, S, S],
    )?;
    Ok(OutlierByIqr {
        cleaned: out.matrix(0)?,
        q1: out.matrix(1)?,
        q3: out.matrix(2)?,
        iqr: out.matrix(3)?,
        k: out.scalar(4)?,
        repair_method: out.scalar(5)?,
    })
}

/// Centers and scales the columns of `x`.
///
/// Recognized options: `center`, `scale`. Returns the transformed matrix, the
/// column means and the per-column scale factors.
pub fn scale(
    ctx: &mut SessionContext,
    x: Matrix,
    options: Options,
) -> Result<(Matrix, Matrix, Matrix), GraphError> {
    let out = invoke_multi(ctx, "scale", vec![("X", x.into())], options, &[M, M, M])?;
    Ok((out.matrix(0)?, out.matrix(1)?, out.matrix(2)?))
}

/// Required inputs of [`bandit`].
#[derive(Debug, Clone)]
pub struct BanditInputs {
    pub x_train: Matrix,
    pub y_train: Matrix,
    pub x_test: Matrix,
    pub y_test: Matrix,
    pub meta_list: List,
    pub evaluation_func: String,
    pub eval_fun_hp: Matrix,
    pub lp: Frame,
    pub lp_hp: Matrix,
    pub primitives: Frame,
    pub param: Frame,
    pub base_line_score: f64,
    pub cv: bool,
}

/// Searches cleaning pipelines, treating each primitive as a bandit arm.
///
/// Recognized options: `K`, `R`, `cvk`, `verbose`, `output`. Returns the best
/// pipelines, their hyper-parameters, their scores and the applied primitives.
pub fn bandit(
    ctx: &mut SessionContext,
    inputs: BanditInputs,
    options: Options,
) -> Result<(Frame, Matrix, Matrix, Frame), GraphError> {
    let required: Vec<(&str, Value)> = vec![
        ("X_train", inputs.x_train.into()),
        ("Y_train", inputs.y_train.into()),
        ("X_test", inputs.x_test.into()),
        ("Y_test", inputs.y_test.into()),
        ("metaList", inputs.meta_list.into()),
        ("evaluationFunc", inputs.evaluation_func.into()),
        ("evalFunHp", inputs.eval_fun_hp.into()),
        ("lp", inputs.lp.into()),
        ("lpHp", inputs.lp_hp.into()),
        ("primitives", inputs.primitives.into()),
        ("param", inputs.param.into()),
        ("baseLineScore", inputs.base_line_score.into()),
        ("cv", inputs.cv.into()),
    ];
    let out = invoke_multi(ctx, "bandit", required, options, &[F, M, M, F])?;
    Ok((out.frame(0)?, out.matrix(1)?, out.matrix(2)?, out.frame(3)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ParamValue;
    use crate::schema::{OperationCatalog, ParamKind};

    #[test]
    fn every_builtin_schema_is_valid() {
        for schema in builtin_schemas() {
            schema.validate().unwrap();
        }
    }

    #[test]
    fn kmeans_yields_two_matrices_from_one_node() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let (c, y) = kmeans(&mut ctx, x, Options::new()).unwrap();

        let producer = ctx.producer_of(c).unwrap();
        assert_eq!(ctx.producer_of(y), Some(producer));
        assert_eq!(ctx.graph().operations.len(), 1);
        let op = ctx.operation(producer).unwrap();
        assert_eq!(op.op_type, "kmeans");
        assert_eq!(op.output_operands_slice(), &[c.id(), y.id()]);
        assert_eq!(op.params.keys().collect::<Vec<_>>(), vec!["X"]);
    }

    #[test]
    fn glm_yields_one_matrix_representing_the_call() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let y = ctx.matrix("Y").unwrap();
        let beta = glm(&mut ctx, x, y, Options::new()).unwrap();

        let op = ctx.operation(ctx.producer_of(beta).unwrap()).unwrap();
        assert!(!op.is_multi_return());
        assert_eq!(op.output_operand, Some(beta.id()));
        assert_eq!(op.params.keys().collect::<Vec<_>>(), vec!["X", "Y"]);
    }

    #[test]
    fn outlier_by_iqr_binds_literals_and_types_outputs() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let out = outlier_by_iqr(
            &mut ctx,
            x,
            1.5,
            0,
            Options::new().with("repairMethod", 2).with("verbose", false),
        )
        .unwrap();

        let op = ctx.operation(ctx.producer_of(out.k).unwrap()).unwrap();
        assert_eq!(op.output_operands_slice().len(), 6);
        assert_eq!(op.params["k"], ParamValue::Double(1.5));
        assert_eq!(op.params["max_iterations"], ParamValue::Integer(0));
        assert_eq!(op.params["repairMethod"], ParamValue::Integer(2));
        assert_eq!(
            ctx.graph().operand(out.repair_method.id()).unwrap().operand_type,
            OperandType::Scalar
        );
    }

    #[test]
    fn bandit_mixes_operand_kinds() {
        let mut ctx = SessionContext::new();
        let inputs = BanditInputs {
            x_train: ctx.matrix("X_train").unwrap(),
            y_train: ctx.matrix("Y_train").unwrap(),
            x_test: ctx.matrix("X_test").unwrap(),
            y_test: ctx.matrix("Y_test").unwrap(),
            meta_list: ctx.list("metaList").unwrap(),
            evaluation_func: "evalClassification".to_string(),
            eval_fun_hp: ctx.matrix("evalFunHp").unwrap(),
            lp: ctx.frame("lp").unwrap(),
            lp_hp: ctx.matrix("lpHp").unwrap(),
            primitives: ctx.frame("primitives").unwrap(),
            param: ctx.frame("param").unwrap(),
            base_line_score: 0.7,
            cv: true,
        };
        let (pipelines, hp, scores, applied) =
            bandit(&mut ctx, inputs, Options::new().with("K", 3).with("cvk", 3)).unwrap();

        let producer = ctx.producer_of(pipelines);
        assert!(producer.is_some());
        for handle in [hp.handle(), scores.handle(), applied.handle()] {
            assert_eq!(ctx.producer_of(handle), producer);
        }
        let op = ctx.operation(producer.unwrap()).unwrap();
        assert_eq!(op.params.len(), 15);
        assert_eq!(
            op.params["evaluationFunc"],
            ParamValue::Text("evalClassification".to_string())
        );
    }

    #[test]
    fn replaced_schema_with_other_arity_is_rejected_before_graph_growth() {
        let mut catalog = OperationCatalog::with_defaults();
        catalog
            .register(
                OperationSchema::new("scale")
                    .required("X", ParamKind::Matrix)
                    .returns(&[OperandType::Matrix]),
            )
            .unwrap();
        let mut ctx = SessionContext::with_catalog(Default::default(), catalog);
        let x = ctx.matrix("X").unwrap();
        let err = scale(&mut ctx, x, Options::new()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnexpectedArity {
                expected: 3,
                actual: 1
            }
        ));
        assert!(ctx.graph().operations.is_empty());
    }

    #[test]
    fn replaced_schema_with_other_output_types_leaves_graph_untouched() {
        let mut catalog = OperationCatalog::with_defaults();
        catalog
            .register(
                OperationSchema::new("kmeans")
                    .required("X", ParamKind::Matrix)
                    .returns(&[OperandType::Matrix, OperandType::Scalar]),
            )
            .unwrap();
        catalog
            .register(
                OperationSchema::new("glm")
                    .required("X", ParamKind::Matrix)
                    .required("Y", ParamKind::Matrix)
                    .returns(&[OperandType::Matrix, OperandType::Matrix]),
            )
            .unwrap();
        let mut ctx = SessionContext::with_catalog(Default::default(), catalog);
        let x = ctx.matrix("X").unwrap();
        let y = ctx.matrix("Y").unwrap();

        assert!(matches!(
            kmeans(&mut ctx, x, Options::new()),
            Err(GraphError::OutputTypeMismatch {
                index: 1,
                expected: OperandType::Matrix,
                actual: OperandType::Scalar,
            })
        ));
        assert!(matches!(
            glm(&mut ctx, x, y, Options::new()),
            Err(GraphError::UnexpectedArity {
                expected: 1,
                actual: 2
            })
        ));
        assert!(ctx.graph().operations.is_empty());
        assert_eq!(ctx.graph().operands.len(), 2);
    }
}
